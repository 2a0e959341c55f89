//! Material resource vocabulary and the hospital stock ledger.
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

macro_rules! material_resources {
    ($($variant:ident => $key:literal),+ $(,)?) => {
        /// Disposable supplies consumed by treatment plans.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub enum MaterialResource {
            $(
                #[serde(rename = $key)]
                $variant,
            )+
        }

        impl MaterialResource {
            pub const ALL: &'static [Self] = &[$(Self::$variant),+];

            /// Identifier used by rule tables and logs.
            #[must_use]
            pub const fn key(self) -> &'static str {
                match self {
                    $(Self::$variant => $key,)+
                }
            }
        }
    };
}

material_resources! {
    AbsorbentGauze => "ABSORBENT_GAUZE",
    Adrenaline => "ADRENALINE",
    Amoxicillin => "AMOXICILLIN",
    AtropineSo4 => "ATROPINE_SO4",
    BalloonCatheter => "BALLOON_CATHETER",
    BtSet => "BT_SET",
    Canular => "CANULAR",
    Ceftriaxone => "CEFTRIAXONE",
    Chlorine => "CHLORINE",
    ChromicCutgut2_0 => "CHROMIC_CUTGUT_2_0",
    ChromicCutgut2 => "CHROMIC_CUTGUT_2",
    ChromicCutgut1 => "CHROMIC_CUTGUT_1",
    ChromicCutgut2Taper => "CHROMIC_CUTGUT_2_TAPER",
    CoatedPga => "COATED_PGA",
    CottonWool => "COTTON_WOOL",
    Dettol => "DETTOL",
    Dexamethasone => "DEXAMETHASONE",
    Diazepam => "DIAZEPAM",
    DiclofenacNaLiq => "DICLOFENAC_NA_LIQ",
    DiclofenacNaTab => "DICLOFENAC_NA_TAB",
    Erythromycin => "ERYTHROMYCIN",
    Feso4Folic => "FESO4_FOLIC",
    Gentamycin => "GENTAMYCIN",
    GlovesLatex => "GLOVES_LATEX",
    GlovesSurgical => "GLOVES_SURGICAL",
    Hydralazine => "HYDRALAZINE",
    Hydrocortisone => "HYDROCORTISONE",
    IvSet => "IV_SET",
    Lignocaine => "LIGNOCAINE",
    MethSpirit => "METH_SPIRIT",
    Methyldopa => "METHYLDOPA",
    MetronidazoleLiq => "METRONIDAZOLE_LIQ",
    MetronidazoleTab => "METRONIDAZOLE_TAB",
    MgSo4 => "MG_SO4",
    Misoprostol => "MISOPROSTOL",
    NaclDextrose => "NACL_DEXTROSE",
    Nacl => "NACL",
    Nifedipine => "NIFEDIPINE",
    Oxytocin => "OXYTOCIN",
    Paracetamol => "PARACETAMOL",
    Povidine => "POVIDINE",
    ScalpBlade => "SCALP_BLADE",
    SilkBraided2 => "SILK_BRAIDED_2",
    SilkBraided0 => "SILK_BRAIDED_0",
    SodiumLactateRinger => "SODIUM_LACTATE_RINGER",
    SpinalNeedle => "SPINAL_NEEDLE",
    Syringes2cc => "SYRINGES_2CC",
    Syringes5cc => "SYRINGES_5CC",
    Syringes10cc => "SYRINGES_10CC",
    Tramadol => "TRAMADOL",
    UmbClamp => "UMB_CLAMP",
    UrineCollectionBag => "URINE_COLLECTION_BAG",
    Water => "WATER",
    ZnoPlaster => "ZNO_PLASTER",
}

/// Placeholder used by rule tables for plans that consume no supplies.
pub const NO_RESOURCE_KEY: &str = "NONE";

impl fmt::Display for MaterialResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Raised when a table references a supply outside the vocabulary.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown material resource `{0}`")]
pub struct UnknownResource(pub String);

impl FromStr for MaterialResource {
    type Err = UnknownResource;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let token = s.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|resource| resource.key().eq_ignore_ascii_case(token))
            .ok_or_else(|| UnknownResource(token.to_string()))
    }
}

/// Doses keyed by resource, in table units (mg, pieces, ml).
pub type Doses = BTreeMap<MaterialResource, f64>;

/// Material inventory. Quantities never go negative: a consumption that
/// cannot be covered is rejected rather than clamped.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Stock {
    levels: BTreeMap<MaterialResource, f64>,
}

impl Stock {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a stock from initial quantities, skipping non-positive entries.
    #[must_use]
    pub fn from_levels<I>(levels: I) -> Self
    where
        I: IntoIterator<Item = (MaterialResource, f64)>,
    {
        let mut stock = Self::new();
        for (resource, amount) in levels {
            stock.add(resource, amount);
        }
        stock
    }

    /// Add supplies. Non-positive amounts are ignored.
    pub fn add(&mut self, resource: MaterialResource, amount: f64) {
        if !(amount > 0.0) {
            return;
        }
        *self.levels.entry(resource).or_insert(0.0) += amount;
    }

    #[must_use]
    pub fn level(&self, resource: MaterialResource) -> f64 {
        self.levels.get(&resource).copied().unwrap_or(0.0)
    }

    /// Whether `dose` of `resource` can be covered. Unstocked resources never are.
    #[must_use]
    pub fn is_available(&self, resource: MaterialResource, dose: f64) -> bool {
        self.levels
            .get(&resource)
            .is_some_and(|&level| level >= dose)
    }

    /// Whether every dose in `doses` can be covered at once.
    #[must_use]
    pub fn covers(&self, doses: &Doses) -> bool {
        doses
            .iter()
            .all(|(&resource, &dose)| self.is_available(resource, dose))
    }

    /// Consume a single dose. Returns `false` and leaves the stock untouched when
    /// the dose cannot be covered.
    pub fn consume(&mut self, resource: MaterialResource, dose: f64) -> bool {
        match self.levels.get_mut(&resource) {
            Some(level) if *level >= dose => {
                *level -= dose;
                true
            }
            _ => false,
        }
    }

    /// Consume every dose, or nothing if any single dose is short.
    pub fn consume_all(&mut self, doses: &Doses) -> bool {
        if !self.covers(doses) {
            return false;
        }
        for (&resource, &dose) in doses {
            self.consume(resource, dose);
        }
        true
    }

    /// Current levels in resource order.
    #[must_use]
    pub const fn levels(&self) -> &BTreeMap<MaterialResource, f64> {
        &self.levels
    }
}
