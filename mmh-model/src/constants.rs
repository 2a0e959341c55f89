//! Centralized defaults and tuning constants for the hospital model.
//!
//! Run parameters that vary between experiments live in `SimulationConfig`;
//! the values here are the defaults it falls back to.

use crate::resources::MaterialResource;

// Run parameters -----------------------------------------------------------
pub(crate) const DEFAULT_ARRIVAL_PROBABILITY: f64 = 0.41;
pub(crate) const DEFAULT_ARRIVAL_SLOTS: u32 = 1;
/// Ninety days of fifteen-minute cycles.
pub(crate) const DEFAULT_TOTAL_CYCLES: u32 = 8_640;
pub(crate) const DEFAULT_MIN_AGE: u32 = 18;
pub(crate) const DEFAULT_MAX_AGE: u32 = 45;

// Staffing -----------------------------------------------------------------
pub(crate) const DEFAULT_NURSES_ON_SHIFT: u32 = 10;
pub(crate) const DEFAULT_DOCTORS_ON_SHIFT: u32 = 10;
pub(crate) const DEFAULT_CYCLES_PER_DAY: u32 = 96;
/// 07:00 in fifteen-minute cycles.
pub(crate) const DEFAULT_DAY_SHIFT_START: u32 = 28;
/// 19:00 in fifteen-minute cycles.
pub(crate) const DEFAULT_DAY_SHIFT_END: u32 = 76;

// Patient generation -------------------------------------------------------
/// Incidence probabilities must sum to one at this many decimal places.
pub(crate) const INCIDENCE_UNITY_PLACES: i32 = 5;
/// Resampling cap for truncated-normal severities before falling back to the mean.
pub(crate) const SEVERITY_MAX_ATTEMPTS: u32 = 1_000;

// Seed derivation ----------------------------------------------------------
pub(crate) const RNG_DOMAIN_ARRIVAL: &[u8] = b"mmh.arrival";
pub(crate) const RNG_DOMAIN_ADMISSION: &[u8] = b"mmh.admission";
pub(crate) const RNG_DOMAIN_MORTALITY: &[u8] = b"mmh.mortality";

/// Opening inventory of disposable supplies, in table units.
/// Zero entries are listed so the catalogue is complete; they are never stocked.
pub(crate) const DEFAULT_STOCK: &[(MaterialResource, f64)] = &[
    (MaterialResource::AbsorbentGauze, 2_000.0),
    (MaterialResource::Adrenaline, 0.0),
    (MaterialResource::Amoxicillin, 500_000.0),
    (MaterialResource::AtropineSo4, 250.0),
    (MaterialResource::BalloonCatheter, 600.0),
    (MaterialResource::BtSet, 0.0),
    (MaterialResource::Canular, 500.0),
    (MaterialResource::Ceftriaxone, 506.0),
    (MaterialResource::Chlorine, 5.0),
    (MaterialResource::ChromicCutgut2_0, 600.0),
    (MaterialResource::ChromicCutgut2, 0.0),
    (MaterialResource::ChromicCutgut1, 360.0),
    (MaterialResource::ChromicCutgut2Taper, 420.0),
    (MaterialResource::CoatedPga, 600.0),
    (MaterialResource::CottonWool, 0.0),
    (MaterialResource::Dettol, 10.0),
    (MaterialResource::Dexamethasone, 300.0),
    (MaterialResource::Diazepam, 0.0),
    (MaterialResource::DiclofenacNaLiq, 4_200.0),
    (MaterialResource::DiclofenacNaTab, 50_000.0),
    (MaterialResource::Erythromycin, 0.0),
    (MaterialResource::Feso4Folic, 200_000.0),
    (MaterialResource::Gentamycin, 0.0),
    (MaterialResource::GlovesLatex, 12_000.0),
    (MaterialResource::GlovesSurgical, 4_000.0),
    (MaterialResource::Hydralazine, 2_200.0),
    (MaterialResource::Hydrocortisone, 0.0),
    (MaterialResource::IvSet, 1_000.0),
    (MaterialResource::Lignocaine, 2_500.0),
    (MaterialResource::MethSpirit, 15.0),
    (MaterialResource::Methyldopa, 700_000.0),
    (MaterialResource::MetronidazoleLiq, 300_000.0),
    (MaterialResource::MetronidazoleTab, 2_000_000.0),
    (MaterialResource::MgSo4, 15_000.0),
    (MaterialResource::Misoprostol, 2_000_000.0),
    (MaterialResource::Nacl, 312_000.0),
    (MaterialResource::NaclDextrose, 60_000.0),
    (MaterialResource::Nifedipine, 0.0),
    (MaterialResource::Oxytocin, 15_000.0),
    (MaterialResource::Paracetamol, 2_000_000.0),
    (MaterialResource::Povidine, 40.0),
    (MaterialResource::ScalpBlade, 500.0),
    (MaterialResource::SilkBraided2, 60.0),
    (MaterialResource::SilkBraided0, 120.0),
    (MaterialResource::SodiumLactateRinger, 600_000.0),
    (MaterialResource::SpinalNeedle, 250.0),
    (MaterialResource::Syringes2cc, 1_800.0),
    (MaterialResource::Syringes5cc, 2_800.0),
    (MaterialResource::Syringes10cc, 0.0),
    (MaterialResource::Tramadol, 100_000.0),
    (MaterialResource::UmbClamp, 1_000.0),
    (MaterialResource::UrineCollectionBag, 250.0),
    (MaterialResource::Water, 250.0),
    (MaterialResource::ZnoPlaster, 0.0),
];
