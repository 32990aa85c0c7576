//! Conversion between the one-byte v4 max-life code and a lifetime in
//! seconds.

/// Code meaning "no explicit maximum".
pub const NO_EXPIRE_CODE: u8 = 0xff;

/// The legacy "never" date; lifetimes at or past it have no maximum.
pub const NEVER: u32 = 0x7fff_ffff;

/// Step of the linear code range.
const LINEAR_STEP: u32 = 5 * 60;

const LINEAR_MAX: u8 = 0x7f;
const FIXED_MIN: u8 = 0x80;
const FIXED_MAX: u8 = 0xbf;

/// Ceiling of the fixed table (30 days).
pub const MAX_FIXED_LIFETIME: u32 = 30 * 24 * 3600;

/// Exponential steps from 38 400 s up to the 30-day ceiling: entry `i` is
/// `38400 * 67.5^(i/63)` rounded to the nearest second.
const FIXED_LIFETIMES: [u32; 64] = [
    38_400, 41_055, 43_894, 46_929, 50_174, 53_643, 57_352, 61_318, 65_558, 70_091, 74_937, 80_119,
    85_658, 91_581, 97_914, 104_684, 111_922, 119_661, 127_935, 136_781, 146_239, 156_350,
    167_161, 178_720, 191_077, 204_289, 218_415, 233_517, 249_663, 266_926, 285_383, 305_116,
    326_213, 348_769, 372_885, 398_668, 426_233, 455_705, 487_215, 520_903, 556_921, 595_430,
    636_600, 680_618, 727_679, 777_995, 831_789, 889_303, 950_794, 1_016_537, 1_086_825,
    1_161_973, 1_242_318, 1_328_218, 1_420_057, 1_518_247, 1_623_226, 1_735_464, 1_855_462,
    1_983_758, 2_120_925, 2_267_576, 2_424_367, 2_592_000,
];

/// Lifetime named by a max-life code, or `None` for "no explicit maximum".
///
/// Codes past the fixed table sit one second apart above the 30-day
/// ceiling so that every code maps back to itself.
pub fn code_to_lifetime(code: u8) -> Option<u32> {
    match code {
        NO_EXPIRE_CODE => None,
        0..=LINEAR_MAX => Some(u32::from(code) * LINEAR_STEP),
        FIXED_MIN..=FIXED_MAX => Some(FIXED_LIFETIMES[usize::from(code - FIXED_MIN)]),
        _ => Some(MAX_FIXED_LIFETIME + u32::from(code - FIXED_MAX)),
    }
}

/// Smallest code whose lifetime is at least `lifetime`.
pub fn lifetime_to_code(lifetime: Option<u32>) -> u8 {
    let Some(secs) = lifetime else {
        return NO_EXPIRE_CODE;
    };
    if secs >= NEVER {
        return NO_EXPIRE_CODE;
    }
    if secs < FIXED_LIFETIMES[0] {
        // at most 128, which is the first fixed code
        return secs.div_ceil(LINEAR_STEP) as u8;
    }
    if secs <= MAX_FIXED_LIFETIME {
        let index = FIXED_LIFETIMES.partition_point(|&entry| entry < secs);
        return FIXED_MIN + index as u8;
    }
    let over = (secs - MAX_FIXED_LIFETIME).min(u32::from(NO_EXPIRE_CODE - 1 - FIXED_MAX));
    FIXED_MAX + over as u8
}
