use super::lifetime::{code_to_lifetime, lifetime_to_code};
use super::record::{DesKey, LegacyRecord, PresenceMask, Slot, MAX_NAME_LEN};
use super::CodecError;
use crate::admin::{KeyData, Mask, Principal, PrincipalEntry};

/// Converts records between the v4 fixed-field form and the mask-addressed
/// form of the administration API.
#[derive(Debug, Clone)]
pub struct FieldTranslator {
    realm: String,
    extended: bool,
}

impl FieldTranslator {
    /// `realm` is attached to every inbound principal name; `extended`
    /// enables the modification-metadata and key-version slots.
    pub fn new(realm: impl Into<String>, extended: bool) -> Self {
        Self {
            realm: realm.into(),
            extended,
        }
    }

    /// Builds an entry plus the mask of every attribute it sets.
    pub fn to_modern(&self, record: &LegacyRecord) -> Result<(PrincipalEntry, Mask), CodecError> {
        let mut entry = PrincipalEntry::default();
        let mut mask = Mask::empty();

        if let Some(principal) = self.principal_of(record.name.as_deref(), record.instance.as_deref())? {
            entry.principal = Some(principal);
            mask |= Slot::Name.capability();
        }
        if let Some(exp) = record.exp_date {
            entry.pw_expiration = i64::from(exp);
            mask |= Slot::ExpDate.capability();
        }
        if let Some(attributes) = record.attributes {
            entry.attributes = u32::from(attributes);
            mask |= Slot::Attributes.capability();
        }
        if let Some(code) = record.max_life {
            entry.max_life = code_to_lifetime(code).unwrap_or(0);
            mask |= Slot::MaxLife.capability();
        }
        if let Some(key) = record.des_key {
            let kvno = if self.extended {
                record.key_version.map(u32::from).unwrap_or(0)
            } else {
                0
            };
            entry.key_data = KeyData::des_fanout(key.to_bytes(), kvno);
            mask |= Slot::DesKey.capability();
        }
        if self.extended {
            if let Some(date) = record.mod_date {
                entry.mod_date = i64::from(date);
                mask |= Slot::ModDate.capability();
            }
            // The modifier instance only qualifies a modifier name.
            if let Some(name) = record.mod_name.as_deref() {
                let instance = record.mod_instance.as_deref().unwrap_or("");
                let modifier = self
                    .principal_of(Some(name), Some(instance))?
                    .ok_or(CodecError::InvalidPrincipal("empty modifier name"))?;
                entry.mod_name = Some(modifier);
                mask |= Slot::ModName.capability();
            }
        }
        Ok((entry, mask))
    }

    /// Builds only the principal identifier of `record`.
    pub fn principal(&self, record: &LegacyRecord) -> Result<Principal, CodecError> {
        self.principal_of(record.name.as_deref(), record.instance.as_deref())?
            .ok_or(CodecError::InvalidPrincipal("name and instance are required"))
    }

    /// Emits the attributes of `entry` selected by `mask`.
    pub fn from_modern(&self, entry: &PrincipalEntry, mask: Mask) -> Result<LegacyRecord, CodecError> {
        let mut record = LegacyRecord::default();

        if mask.contains(Mask::PRINCIPAL) {
            if let Some(principal) = &entry.principal {
                let (name, instance) = legacy_pair(principal, "name", "instance")?;
                record.name = Some(name);
                record.instance = Some(instance);
            }
        }
        if mask.intersects(Mask::PW_EXPIRATION | Mask::PRINC_EXPIRE_TIME) {
            let earliest = [entry.princ_expire_time, entry.pw_expiration]
                .into_iter()
                .filter(|t| *t != 0)
                .min();
            if let Some(exp) = earliest {
                record.exp_date = Some(i32::try_from(exp).unwrap_or(i32::MAX));
            }
        }
        if mask.contains(Mask::ATTRIBUTES) {
            record.attributes = Some((entry.attributes & 0xffff) as u16);
        }
        if mask.contains(Mask::MAX_LIFE) {
            let lifetime = (entry.max_life != 0).then_some(entry.max_life);
            record.max_life = Some(lifetime_to_code(lifetime));
        }
        if mask.contains(Mask::KEY_DATA) {
            record.des_key = entry
                .key_data
                .iter()
                .find_map(KeyData::as_des_key)
                .map(DesKey::from_bytes);
            if self.extended {
                record.key_version = entry.key_data.first().map(|k| (k.kvno & 0xff) as u8);
            }
        }
        if self.extended {
            if mask.contains(Mask::MOD_TIME) {
                record.mod_date = Some(i32::try_from(entry.mod_date).unwrap_or(i32::MAX));
            }
            if mask.contains(Mask::MOD_NAME) {
                if let Some(modifier) = &entry.mod_name {
                    let (name, instance) = legacy_pair(modifier, "modifier name", "modifier instance")?;
                    record.mod_name = Some(name);
                    record.mod_instance = Some(instance);
                }
            }
        }
        Ok(record)
    }

    fn principal_of(&self, name: Option<&str>, instance: Option<&str>) -> Result<Option<Principal>, CodecError> {
        match (name, instance) {
            (None, None) => Ok(None),
            (Some(name), Some(instance)) => Principal::from_legacy(name, instance, &self.realm)
                .map(Some)
                .map_err(|_| CodecError::InvalidPrincipal("empty name")),
            (Some(_), None) => Err(CodecError::InvalidPrincipal("name without instance")),
            (None, Some(_)) => Err(CodecError::InvalidPrincipal("instance without name")),
        }
    }
}

/// Capability mask requested by a get selection. The expiration slot also
/// pulls the principal expiration so the earliest of the two can be sent.
pub fn selection_mask(selection: PresenceMask) -> Mask {
    selection.slots().fold(Mask::empty(), |mask, slot| {
        let extra = if slot == Slot::ExpDate {
            Mask::PRINC_EXPIRE_TIME
        } else {
            Mask::empty()
        };
        mask | slot.capability() | extra
    })
}

fn legacy_pair(
    principal: &Principal,
    name_field: &'static str,
    instance_field: &'static str,
) -> Result<(String, String), CodecError> {
    let (name, instance) = principal
        .to_legacy()
        .ok_or(CodecError::InvalidPrincipal("more than two components"))?;
    for (field, value) in [(name_field, &name), (instance_field, &instance)] {
        if value.len() > MAX_NAME_LEN {
            return Err(CodecError::FieldTooLong {
                field,
                len: value.len(),
                max: MAX_NAME_LEN,
            });
        }
    }
    Ok((name, instance))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::admin::LegacyEncType;
    use proptest::option;
    use proptest::prelude::*;

    const REALM: &str = "EXAMPLE.ORG";

    fn base() -> FieldTranslator {
        FieldTranslator::new(REALM, false)
    }

    fn extended() -> FieldTranslator {
        FieldTranslator::new(REALM, true)
    }

    #[test]
    fn principal_and_lifetime_translate() {
        let record = LegacyRecord {
            name: Some("alice".into()),
            instance: Some(String::new()),
            max_life: Some(255),
            ..Default::default()
        };
        let (entry, mask) = base().to_modern(&record).unwrap();
        assert_eq!(mask, Mask::PRINCIPAL | Mask::MAX_LIFE);
        assert_eq!(entry.principal.unwrap().to_string(), "alice@EXAMPLE.ORG");
        assert_eq!(entry.max_life, 0);
    }

    #[test]
    fn half_a_principal_is_rejected() {
        let only_instance = LegacyRecord {
            instance: Some("admin".into()),
            ..Default::default()
        };
        assert!(matches!(
            base().to_modern(&only_instance),
            Err(CodecError::InvalidPrincipal(_))
        ));

        let only_name = LegacyRecord {
            name: Some("alice".into()),
            ..Default::default()
        };
        assert!(matches!(base().principal(&only_name), Err(CodecError::InvalidPrincipal(_))));
    }

    #[test]
    fn des_key_fans_out_into_three_entries() {
        let record = LegacyRecord {
            name: Some("alice".into()),
            instance: Some(String::new()),
            des_key: Some(DesKey::from_bytes([1, 2, 3, 4, 5, 6, 7, 8])),
            key_version: Some(6),
            ..Default::default()
        };

        let (entry, mask) = base().to_modern(&record).unwrap();
        assert!(mask.contains(Mask::KEY_DATA));
        assert_eq!(entry.key_data.len(), 3);
        let types: Vec<_> = entry
            .key_data
            .iter()
            .map(|k| LegacyEncType::from_enctype(k.enctype))
            .collect();
        assert_eq!(
            types,
            vec![
                Some(LegacyEncType::DesCbcMd5),
                Some(LegacyEncType::DesCbcMd4),
                Some(LegacyEncType::DesCbcCrc)
            ]
        );
        assert!(entry.key_data.iter().all(|k| k.contents == [1, 2, 3, 4, 5, 6, 7, 8]));
        assert!(entry.key_data.iter().all(|k| k.kvno == 0));

        let (entry, _) = extended().to_modern(&record).unwrap();
        assert!(entry.key_data.iter().all(|k| k.kvno == 6));
    }

    #[test]
    fn outbound_expiration_is_the_earliest_nonzero() {
        let entry = PrincipalEntry {
            princ_expire_time: 2_000,
            pw_expiration: 1_000,
            ..Default::default()
        };
        let record = base().from_modern(&entry, Mask::PW_EXPIRATION).unwrap();
        assert_eq!(record.exp_date, Some(1_000));

        let entry = PrincipalEntry {
            princ_expire_time: 2_000,
            pw_expiration: 0,
            ..Default::default()
        };
        let record = base().from_modern(&entry, Mask::PW_EXPIRATION).unwrap();
        assert_eq!(record.exp_date, Some(2_000));

        let record = base()
            .from_modern(&PrincipalEntry::default(), Mask::PW_EXPIRATION)
            .unwrap();
        assert_eq!(record.exp_date, None);
    }

    #[test]
    fn unlimited_lifetime_is_code_255() {
        let entry = PrincipalEntry::default();
        let record = base().from_modern(&entry, Mask::MAX_LIFE).unwrap();
        assert_eq!(record.max_life, Some(255));
    }

    #[test]
    fn extended_slots_follow_the_switch() {
        let entry = PrincipalEntry {
            principal: Some(Principal::from_legacy("alice", "", REALM).unwrap()),
            mod_date: 42,
            mod_name: Some(Principal::from_legacy("root", "admin", REALM).unwrap()),
            key_data: KeyData::des_fanout([9; 8], 3),
            ..Default::default()
        };
        let mask = Mask::ADD_READBACK;

        let record = base().from_modern(&entry, mask).unwrap();
        assert_eq!(record.mod_date, None);
        assert_eq!(record.mod_name, None);
        assert_eq!(record.key_version, None);
        assert_eq!(record.des_key, Some(DesKey::from_bytes([9; 8])));

        let record = extended().from_modern(&entry, mask).unwrap();
        assert_eq!(record.mod_date, Some(42));
        assert_eq!(record.mod_name.as_deref(), Some("root"));
        assert_eq!(record.mod_instance.as_deref(), Some("admin"));
        assert_eq!(record.key_version, Some(3));
    }

    #[test]
    fn fields_outside_the_mask_are_not_emitted() {
        let entry = PrincipalEntry {
            principal: Some(Principal::from_legacy("alice", "", REALM).unwrap()),
            attributes: 7,
            max_life: 3600,
            ..Default::default()
        };
        let record = base().from_modern(&entry, Mask::ATTRIBUTES).unwrap();
        assert_eq!(record.presence(), PresenceMask::from_slots([Slot::Attributes]));
    }

    #[test]
    fn long_modern_names_do_not_fit() {
        let entry = PrincipalEntry {
            principal: Some(Principal::from_legacy(&"x".repeat(40), "", REALM).unwrap()),
            ..Default::default()
        };
        assert!(matches!(
            base().from_modern(&entry, Mask::PRINCIPAL),
            Err(CodecError::FieldTooLong { field: "name", .. })
        ));
    }

    #[test]
    fn modifier_name_alone_is_accepted() {
        let record = LegacyRecord {
            name: Some("alice".into()),
            instance: Some(String::new()),
            mod_name: Some("root".into()),
            ..Default::default()
        };
        let (entry, mask) = extended().to_modern(&record).unwrap();
        assert!(mask.contains(Mask::MOD_NAME));
        assert_eq!(entry.mod_name.unwrap().to_string(), "root@EXAMPLE.ORG");

        let record = LegacyRecord {
            name: Some("alice".into()),
            instance: Some(String::new()),
            mod_instance: Some("admin".into()),
            ..Default::default()
        };
        let (entry, mask) = extended().to_modern(&record).unwrap();
        assert!(!mask.contains(Mask::MOD_NAME));
        assert_eq!(entry.mod_name, None);
    }

    #[test]
    fn multi_component_names_have_no_legacy_form() {
        let deep = Principal::new(vec!["host".into(), "a".into(), "b".into()], REALM).unwrap();

        let entry = PrincipalEntry {
            principal: Some(deep.clone()),
            ..Default::default()
        };
        assert!(matches!(
            base().from_modern(&entry, Mask::PRINCIPAL),
            Err(CodecError::InvalidPrincipal(_))
        ));

        let entry = PrincipalEntry {
            principal: Some(Principal::from_legacy("alice", "", REALM).unwrap()),
            mod_name: Some(deep),
            ..Default::default()
        };
        assert!(matches!(
            extended().from_modern(&entry, Mask::PRINCIPAL | Mask::MOD_NAME),
            Err(CodecError::InvalidPrincipal(_))
        ));
    }

    #[test]
    fn selection_uses_the_fixed_slot_table() {
        let selection = PresenceMask::from_slots([Slot::Name, Slot::Instance, Slot::ExpDate, Slot::DesKey]);
        assert_eq!(
            selection_mask(selection),
            Mask::PRINCIPAL | Mask::PW_EXPIRATION | Mask::PRINC_EXPIRE_TIME | Mask::KEY_DATA
        );
        assert_eq!(selection_mask(PresenceMask(0x0000_00ff)), Mask::empty());
    }

    prop_compose! {
        fn arb_base_record()(
            principal in option::of(("[a-z]{1,39}", "[a-z0-9.]{0,39}")),
            exp_date in option::of(1..=i32::MAX),
            attributes in option::of(any::<u16>()),
            max_life in option::of(1..=u8::MAX),
            des_key in option::of(any::<[u8; 8]>()),
        ) -> LegacyRecord {
            let (name, instance) = match principal {
                Some((n, i)) => (Some(n), Some(i)),
                None => (None, None),
            };
            LegacyRecord {
                name,
                instance,
                exp_date,
                attributes,
                max_life,
                des_key: des_key.map(DesKey::from_bytes),
                ..Default::default()
            }
        }
    }

    proptest! {
        #[test]
        fn modern_round_trip_is_idempotent(record in arb_base_record()) {
            let translator = base();
            let (entry, mask) = translator.to_modern(&record).unwrap();
            let back = translator.from_modern(&entry, mask).unwrap();
            prop_assert_eq!(back, record);
        }
    }
}
