use crate::config::EngineConfig;

/// Serialize the extended-status frame, byte-exact: `*S|<unit>|<version>|`
/// then the five raw flag bytes each followed by `|`, then `P<template>|*`.
pub fn build_status_frame(config: &EngineConfig, flags: [u8; 5], template_id: u8) -> Vec<u8> {
    let mut out = Vec::with_capacity(16 + config.software_version.len());
    out.push(b'*');
    out.push(b'S');
    out.push(b'|');
    out.push(config.unit_address);
    out.push(b'|');
    out.extend_from_slice(config.software_version.as_bytes());
    out.push(b'|');
    for byte in flags {
        out.push(byte);
        out.push(b'|');
    }
    out.push(b'P');
    out.push(template_id);
    out.push(b'|');
    out.push(b'*');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_the_power_up_byte_trace() {
        let config = EngineConfig::default();
        let flags = [0x40, 0x40, 0x40, 0x40, 0x61];
        let frame = build_status_frame(&config, flags, b' ');
        let expected: Vec<u8> = vec![
            0x2A, 0x53, 0x7C, 0x30, 0x7C, 0x50, 0x41, 0x59, 0x2D, 0x36, 0x2E, 0x32, 0x32, 0x42,
            0x7C, 0x40, 0x7C, 0x40, 0x7C, 0x40, 0x7C, 0x40, 0x7C, 0x61, 0x7C, 0x50, 0x20, 0x7C,
            0x2A,
        ];
        assert_eq!(frame, expected);
    }
}
