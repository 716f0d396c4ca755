//! Servo EEPROM image codec.
//!
//! A motor keeps its configuration in a 64-byte image where every logical
//! byte is spread over two wire bytes (see [`nibble`](crate::nibble)).
//! [`parse`] decodes and validates an image into an [`Eeprom`] record;
//! [`compose`] writes an edited record back over the image it came from,
//! leaving every reserved byte untouched.
//!
//! ```ignore
//! let mut eeprom = kondo::eeprom::parse(&image)?;
//! eeprom.speed = 100;
//! let edited = kondo::eeprom::compose(&image, &eeprom)?;
//! ```

use serde::{Deserialize, Serialize};

mod address;
mod field;

pub use self::address::{AddressMap, Interval};
pub use self::field::{Field, Value, FIELD_COUNT};

use self::field::{Entry, LAYOUT};
use crate::error::{Error, Result};
use crate::nibble::Flag;

/// Size of an EEPROM image in wire bytes.
pub const IMAGE_LEN: usize = 64;

/// Serial signal speed setting.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignalSpeed {
    #[default]
    High,
    Mid,
    Low,
}

impl SignalSpeed {
    /// Logical byte stored in the image.
    pub fn code(self) -> u8 {
        match self {
            SignalSpeed::High => 0x00,
            SignalSpeed::Mid => 0x01,
            SignalSpeed::Low => 0x10,
        }
    }
    pub fn from_code(code: u8) -> Option<SignalSpeed> {
        match code {
            0x00 => Some(SignalSpeed::High),
            0x01 => Some(SignalSpeed::Mid),
            0x10 => Some(SignalSpeed::Low),
            _ => None,
        }
    }
}

/// Typed view of one EEPROM image.
///
/// Only [`parse`] creates a record. Fields may be edited freely; nothing is
/// validated until the composed image is parsed again.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Eeprom {
    pub stretch_gain: u8,
    pub speed: u8,
    pub punch: u8,
    pub dead_band: u8,
    pub damping: u8,
    pub safe_timer: u8,
    pub flag: Flag,
    pub maximum_pulse_limit: u16,
    pub minimum_pulse_limit: u16,
    pub signal_speed: SignalSpeed,
    pub temperature_limit: u8,
    pub current_limit: u8,
    pub response: u8,
    pub user_offset: i8,
    pub id: u8,
    pub characteristic_change_stretch1: u8,
    pub characteristic_change_stretch2: u8,
    pub characteristic_change_stretch3: u8,
    address: AddressMap,
}

impl Eeprom {
    fn blank() -> Eeprom {
        Eeprom {
            stretch_gain: 0,
            speed: 0,
            punch: 0,
            dead_band: 0,
            damping: 0,
            safe_timer: 0,
            flag: Flag::default(),
            maximum_pulse_limit: 0,
            minimum_pulse_limit: 0,
            signal_speed: SignalSpeed::default(),
            temperature_limit: 0,
            current_limit: 0,
            response: 0,
            user_offset: 0,
            id: 0,
            characteristic_change_stretch1: 0,
            characteristic_change_stretch2: 0,
            characteristic_change_stretch3: 0,
            address: AddressMap::default(),
        }
    }

    /// Byte intervals of the image this record was parsed from.
    pub fn address(&self) -> &AddressMap {
        &self.address
    }

    /// Current value of `field`. The marker always reads `0x5A`.
    pub fn get(&self, field: Field) -> Value {
        match field {
            Field::Fixed => Value::U8(0x5A),
            Field::StretchGain => Value::U8(self.stretch_gain),
            Field::Speed => Value::U8(self.speed),
            Field::Punch => Value::U8(self.punch),
            Field::DeadBand => Value::U8(self.dead_band),
            Field::Damping => Value::U8(self.damping),
            Field::SafeTimer => Value::U8(self.safe_timer),
            Field::Flag => Value::Flag(self.flag),
            Field::MaximumPulseLimit => Value::U16(self.maximum_pulse_limit),
            Field::MinimumPulseLimit => Value::U16(self.minimum_pulse_limit),
            Field::SignalSpeed => Value::SignalSpeed(self.signal_speed),
            Field::TemperatureLimit => Value::U8(self.temperature_limit),
            Field::CurrentLimit => Value::U8(self.current_limit),
            Field::Response => Value::U8(self.response),
            Field::UserOffset => Value::I8(self.user_offset),
            Field::Id => Value::U8(self.id),
            Field::CharacteristicChangeStretch1 => Value::U8(self.characteristic_change_stretch1),
            Field::CharacteristicChangeStretch2 => Value::U8(self.characteristic_change_stretch2),
            Field::CharacteristicChangeStretch3 => Value::U8(self.characteristic_change_stretch3),
        }
    }

    /// Assign `field`. Fails with [`Error::FieldType`] when the value kind
    /// does not match the field, or when `field` is the fixed marker.
    pub fn set(&mut self, field: Field, value: Value) -> Result<()> {
        if field == Field::Fixed {
            return Err(Error::FieldType(field));
        }
        self.assign(field, value)
    }

    fn assign(&mut self, field: Field, value: Value) -> Result<()> {
        match (field, value) {
            (Field::Fixed, Value::U8(_)) => {}
            (Field::StretchGain, Value::U8(v)) => self.stretch_gain = v,
            (Field::Speed, Value::U8(v)) => self.speed = v,
            (Field::Punch, Value::U8(v)) => self.punch = v,
            (Field::DeadBand, Value::U8(v)) => self.dead_band = v,
            (Field::Damping, Value::U8(v)) => self.damping = v,
            (Field::SafeTimer, Value::U8(v)) => self.safe_timer = v,
            (Field::Flag, Value::Flag(v)) => self.flag = v,
            (Field::MaximumPulseLimit, Value::U16(v)) => self.maximum_pulse_limit = v,
            (Field::MinimumPulseLimit, Value::U16(v)) => self.minimum_pulse_limit = v,
            (Field::SignalSpeed, Value::SignalSpeed(v)) => self.signal_speed = v,
            (Field::TemperatureLimit, Value::U8(v)) => self.temperature_limit = v,
            (Field::CurrentLimit, Value::U8(v)) => self.current_limit = v,
            (Field::Response, Value::U8(v)) => self.response = v,
            (Field::UserOffset, Value::I8(v)) => self.user_offset = v,
            (Field::Id, Value::U8(v)) => self.id = v,
            (Field::CharacteristicChangeStretch1, Value::U8(v)) => {
                self.characteristic_change_stretch1 = v
            }
            (Field::CharacteristicChangeStretch2, Value::U8(v)) => {
                self.characteristic_change_stretch2 = v
            }
            (Field::CharacteristicChangeStretch3, Value::U8(v)) => {
                self.characteristic_change_stretch3 = v
            }
            (field, _) => return Err(Error::FieldType(field)),
        }
        Ok(())
    }
}

/// Decode and validate a 64-byte image.
pub fn parse(image: &[u8]) -> Result<Eeprom> {
    if image.len() != IMAGE_LEN {
        return Err(Error::length(IMAGE_LEN, image.len()));
    }
    let mut eeprom = Eeprom::blank();
    let mut cursor = 0;
    for entry in LAYOUT.iter() {
        match *entry {
            Entry::Skip(n) => cursor += n,
            Entry::Field(field, ref kind) => {
                let end = cursor + kind.width();
                let value = kind.decode(field, &image[cursor..end])?;
                eeprom.assign(field, value)?;
                eeprom.address.record(field, Interval::new(cursor, end));
                cursor = end;
            }
        }
    }
    debug_assert_eq!(cursor, IMAGE_LEN);
    Ok(eeprom)
}

/// Write `eeprom` over a copy of `original`.
///
/// Only the intervals in the record's address map are rewritten; every other
/// byte of `original` is carried over unchanged. Field values are encoded as
/// they are, without domain checks.
pub fn compose(original: &[u8], eeprom: &Eeprom) -> Result<Vec<u8>> {
    if original.len() != IMAGE_LEN {
        return Err(Error::length(IMAGE_LEN, original.len()));
    }
    let mut image = original.to_vec();
    for (field, interval) in eeprom.address.iter() {
        let wire = eeprom.get(field).to_wire();
        // widths are fixed per field kind, a mismatch is a layout bug
        debug_assert_eq!(
            wire.len(),
            interval.len(),
            "{} encodes to {} bytes but spans {:?}",
            field,
            wire.len(),
            interval
        );
        image[interval.range()].copy_from_slice(&wire);
    }
    Ok(image)
}

#[cfg(test)]
pub(crate) mod test {
    use super::*;
    use crate::nibble::{encode_flag, encode_i8, encode_u16, encode_u8};
    use rand::{random, Rng};

    /// Image with StretchGain 10, Speed 50, every other field at its minimum
    /// legal value and reserved bytes zero.
    pub(crate) fn sample_image() -> Vec<u8> {
        let mut image = Vec::with_capacity(IMAGE_LEN);
        image.extend(&encode_u8(0x5A));
        image.extend(&encode_u8(10)); // stretch gain
        image.extend(&encode_u8(50)); // speed
        image.extend(&encode_u8(0)); // punch
        image.extend(&encode_u8(0)); // dead band
        image.extend(&encode_u8(1)); // damping
        image.extend(&encode_u8(1)); // safe timer
        image.extend(&encode_flag(Flag::default()));
        image.extend(&encode_u16(3500));
        image.extend(&encode_u16(3500));
        image.extend(&[0, 0]);
        image.extend(&encode_u8(SignalSpeed::High.code()));
        image.extend(&encode_u8(1)); // temperature limit
        image.extend(&encode_u8(1)); // current limit
        image.extend(&[0; 18]);
        image.extend(&encode_u8(1)); // response
        image.extend(&encode_i8(-127));
        image.extend(&[0, 0]);
        image.extend(&encode_u8(0)); // id
        image.extend(&encode_u8(2));
        image.extend(&encode_u8(2));
        image.extend(&encode_u8(2));
        assert_eq!(image.len(), IMAGE_LEN);
        image
    }

    fn random_record(base: &Eeprom) -> Eeprom {
        let mut rng = rand::thread_rng();
        let mut e = base.clone();
        e.stretch_gain = rng.gen_range(0..=127) * 2;
        e.speed = rng.gen_range(0..=127);
        e.punch = rng.gen_range(0..=10);
        e.dead_band = rng.gen_range(0..=10);
        e.damping = rng.gen_range(1..=255);
        e.safe_timer = rng.gen_range(1..=255);
        e.flag = Flag {
            reverse: random(),
            free: random(),
            pwminh: random(),
            rotation_mode: random(),
            slave_mode: random(),
        };
        e.maximum_pulse_limit = rng.gen_range(3500..=11500);
        e.minimum_pulse_limit = rng.gen_range(3500..=11500);
        e.signal_speed = [SignalSpeed::High, SignalSpeed::Mid, SignalSpeed::Low][rng.gen_range(0..3)];
        e.temperature_limit = rng.gen_range(1..=127);
        e.current_limit = rng.gen_range(1..=63);
        e.response = rng.gen_range(1..=5);
        e.user_offset = rng.gen_range(-127..=127);
        e.id = rng.gen_range(0..=31);
        e.characteristic_change_stretch1 = rng.gen_range(1..=127) * 2;
        e.characteristic_change_stretch2 = rng.gen_range(1..=127) * 2;
        e.characteristic_change_stretch3 = rng.gen_range(1..=127) * 2;
        e
    }

    /// Compose `value` into `field` of the sample image and parse the result.
    fn with_field(field: Field, value: Value) -> Result<Eeprom> {
        let image = sample_image();
        let mut e = parse(&image).unwrap();
        e.set(field, value).unwrap();
        parse(&compose(&image, &e).unwrap())
    }

    fn reserved_offsets(e: &Eeprom) -> Vec<usize> {
        (0..IMAGE_LEN)
            .filter(|&i| e.address().field_at(i).is_none())
            .collect()
    }

    #[test]
    fn parse_sample() {
        let e = parse(&sample_image()).unwrap();
        assert_eq!(e.stretch_gain, 10);
        assert_eq!(e.speed, 50);
        assert_eq!(e.damping, 1);
        assert_eq!(e.flag, Flag::default());
        assert_eq!(e.maximum_pulse_limit, 3500);
        assert_eq!(e.signal_speed, SignalSpeed::High);
        assert_eq!(e.user_offset, -127);
        assert_eq!(e.characteristic_change_stretch3, 2);
    }

    #[test]
    fn address_map_intervals() {
        let e = parse(&sample_image()).unwrap();
        let a = e.address();
        assert_eq!(a.iter().count(), FIELD_COUNT);
        assert_eq!(a.get(Field::Fixed), Some(Interval::new(0, 2)));
        assert_eq!(a.get(Field::Flag), Some(Interval::new(14, 16)));
        assert_eq!(a.get(Field::MaximumPulseLimit), Some(Interval::new(16, 20)));
        assert_eq!(a.get(Field::MinimumPulseLimit), Some(Interval::new(20, 24)));
        assert_eq!(a.get(Field::SignalSpeed), Some(Interval::new(26, 28)));
        assert_eq!(a.get(Field::CurrentLimit), Some(Interval::new(30, 32)));
        assert_eq!(a.get(Field::Response), Some(Interval::new(50, 52)));
        assert_eq!(a.get(Field::UserOffset), Some(Interval::new(52, 54)));
        assert_eq!(a.get(Field::Id), Some(Interval::new(56, 58)));
        assert_eq!(
            a.get(Field::CharacteristicChangeStretch3),
            Some(Interval::new(62, 64))
        );
        let reserved: Vec<usize> = vec![24, 25]
            .into_iter()
            .chain(32..50)
            .chain(vec![54, 55])
            .collect();
        assert_eq!(reserved_offsets(&e), reserved);
    }

    #[test]
    fn address_map_json() {
        let e = parse(&sample_image()).unwrap();
        let json = serde_json::to_value(e.address()).unwrap();
        assert_eq!(json["fixed"], serde_json::json!({"start": 0, "end": 2}));
        assert_eq!(
            json["characteristic-change-stretch1"],
            serde_json::json!({"start": 58, "end": 60})
        );
        assert_eq!(json.as_object().unwrap().len(), FIELD_COUNT);
    }

    #[test]
    fn wrong_image_length() {
        let mut image = sample_image();
        image.pop();
        assert_eq!(parse(&image), Err(Error::length(64, 63)));
        image.extend(&[0, 0]);
        assert_eq!(parse(&image), Err(Error::length(64, 65)));
        assert_eq!(
            compose(&image, &parse(&sample_image()).unwrap()),
            Err(Error::length(64, 65))
        );
    }

    #[test]
    fn marker_is_checked_first() {
        let mut image: Vec<u8> = (0..IMAGE_LEN).map(|_| random()).collect();
        image[0] = 0x05;
        image[1] = 0x0B;
        match parse(&image) {
            Err(Error::DataMismatch { field, .. }) => assert_eq!(field, Field::Fixed),
            other => panic!("unexpected {:?}", other),
        }
        let mut image = sample_image();
        image[1] = 0x0B;
        assert_eq!(parse(&image), Err(Error::mismatch(Field::Fixed, 0x5B)));
    }

    #[test]
    fn boundaries() {
        use self::Field::*;
        use self::Value::*;

        let ok = [
            (StretchGain, U8(100)),
            (StretchGain, U8(254)),
            (Speed, U8(127)),
            (Punch, U8(10)),
            (DeadBand, U8(10)),
            (Damping, U8(255)),
            (SafeTimer, U8(255)),
            (MaximumPulseLimit, U16(3500)),
            (MaximumPulseLimit, U16(11500)),
            (MinimumPulseLimit, U16(11500)),
            (TemperatureLimit, U8(127)),
            (CurrentLimit, U8(63)),
            (Response, U8(5)),
            (UserOffset, I8(127)),
            (Id, U8(31)),
            (CharacteristicChangeStretch1, U8(254)),
        ];
        for &(field, value) in ok.iter() {
            let e = with_field(field, value).unwrap_or_else(|err| panic!("{}: {}", field, err));
            assert_eq!(e.get(field), value);
        }

        let rejected = [
            (StretchGain, U8(101), 101),
            (Speed, U8(128), 128),
            (Punch, U8(11), 11),
            (DeadBand, U8(11), 11),
            (Damping, U8(0), 0),
            (SafeTimer, U8(0), 0),
            (MaximumPulseLimit, U16(3499), 3499),
            (MaximumPulseLimit, U16(11501), 11501),
            (MinimumPulseLimit, U16(3499), 3499),
            (TemperatureLimit, U8(0), 0),
            (TemperatureLimit, U8(128), 128),
            (CurrentLimit, U8(64), 64),
            (Response, U8(0), 0),
            (Response, U8(6), 6),
            (Id, U8(32), 32),
            (CharacteristicChangeStretch2, U8(0), 0),
            (CharacteristicChangeStretch3, U8(3), 3),
        ];
        for &(field, value, raw) in rejected.iter() {
            assert_eq!(
                with_field(field, value),
                Err(Error::mismatch(field, raw)),
                "{} = {:?}",
                field,
                value
            );
        }
    }

    #[test]
    fn round_trip_is_idempotent() {
        let image = sample_image();
        let e = parse(&image).unwrap();
        let composed = compose(&image, &e).unwrap();
        assert_eq!(composed, image);
        assert_eq!(parse(&composed).unwrap(), e);
    }

    #[test]
    fn random_records_round_trip() {
        let mut base = sample_image();
        let template = parse(&base).unwrap();
        for i in reserved_offsets(&template) {
            base[i] = random();
        }
        let template = parse(&base).unwrap();
        for _ in 0..500 {
            let e = random_record(&template);
            let composed = compose(&base, &e).unwrap();
            assert_eq!(composed.len(), base.len());
            assert_eq!(parse(&composed).unwrap(), e);
        }
    }

    #[test]
    fn compose_touches_only_the_edited_interval() {
        let mut base = sample_image();
        let template = parse(&base).unwrap();
        for i in reserved_offsets(&template) {
            base[i] = random();
        }
        let original = parse(&base).unwrap();
        for &field in Field::ALL.iter().skip(1) {
            let mut e = original.clone();
            let value = match e.get(field) {
                Value::U8(v) => Value::U8(v ^ 0x02),
                Value::I8(v) => Value::I8(-v),
                Value::U16(v) => Value::U16(v + 1),
                Value::Flag(mut f) => {
                    f.free = !f.free;
                    Value::Flag(f)
                }
                Value::SignalSpeed(_) => Value::SignalSpeed(SignalSpeed::Mid),
            };
            e.set(field, value).unwrap();
            let composed = compose(&base, &e).unwrap();
            let interval = e.address().get(field).unwrap();
            for i in 0..IMAGE_LEN {
                if !interval.contains(i) {
                    assert_eq!(composed[i], base[i], "{} changed byte {}", field, i);
                }
            }
            assert_ne!(composed[interval.range()], base[interval.range()]);
        }
    }

    #[test]
    fn compose_does_not_validate() {
        let image = sample_image();
        let mut e = parse(&image).unwrap();
        e.speed = 200;
        let composed = compose(&image, &e).unwrap();
        let interval = e.address().get(Field::Speed).unwrap();
        assert_eq!(&composed[interval.range()], &encode_u8(200)[..]);
        assert_eq!(parse(&composed), Err(Error::mismatch(Field::Speed, 200u8)));
    }

    #[test]
    fn set_checks_value_kind() {
        let mut e = parse(&sample_image()).unwrap();
        assert_eq!(
            e.set(Field::Speed, Value::U16(5)),
            Err(Error::FieldType(Field::Speed))
        );
        assert_eq!(
            e.set(Field::Fixed, Value::U8(0x5A)),
            Err(Error::FieldType(Field::Fixed))
        );
        e.set(Field::UserOffset, Value::I8(-3)).unwrap();
        assert_eq!(e.user_offset, -3);
        assert_eq!(e.get(Field::Fixed), Value::U8(0x5A));
    }

    #[test]
    fn signal_speed_codes() {
        for s in [SignalSpeed::High, SignalSpeed::Mid, SignalSpeed::Low].iter() {
            assert_eq!(SignalSpeed::from_code(s.code()), Some(*s));
        }
        assert_eq!(SignalSpeed::from_code(10), None);
        // the logical code is nibble-split like any other byte
        assert_eq!(encode_u8(SignalSpeed::Mid.code()), [0x0, 0x1]);
        assert_eq!(encode_u8(SignalSpeed::Low.code()), [0x1, 0x0]);
    }
}
