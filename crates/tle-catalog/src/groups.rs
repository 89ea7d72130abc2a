//! The fixed allowlist of upstream catalog groups.
//!
//! These are the Celestrak `gp.php?GROUP=` slugs the store is willing to
//! load; configuration validation rejects anything else.

/// Known group slugs, as accepted by the upstream `GROUP` parameter.
pub const KNOWN_GROUPS: [&str; 33] = [
    "active",
    "stations",
    "last-30-days",
    "weather",
    "noaa",
    "goes",
    "resource",
    "sarsat",
    "dmc",
    "tdrss",
    "argos",
    "planet",
    "spire",
    "geo",
    "intelsat",
    "ses",
    "iridium",
    "iridium-next",
    "starlink",
    "oneweb",
    "orbcomm",
    "globalstar",
    "amateur",
    "x-comm",
    "other-comm",
    "satnogs",
    "gps-ops",
    "glo-ops",
    "galileo",
    "beidou",
    "sbas",
    "science",
    "cubesat",
];

/// Case-insensitive membership test against [`KNOWN_GROUPS`].
pub fn is_known_group(name: &str) -> bool {
    let lower = name.to_lowercase();
    KNOWN_GROUPS.iter().any(|g| *g == lower)
}
