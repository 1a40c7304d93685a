use pcc_driver::codec::MAX_VOLTAGE;

/// Parse a voltage between 0 and the full-scale output voltage.
pub(crate) fn volts(value: &str) -> Result<f32, String> {
    let volts: f32 = value
        .trim_end_matches(['V', 'v'])
        .parse()
        .map_err(|e| format!("{e}"))?;
    if (0.0..=MAX_VOLTAGE).contains(&volts) {
        Ok(volts)
    } else {
        Err(format!("voltage must be between 0 and {MAX_VOLTAGE} V"))
    }
}
