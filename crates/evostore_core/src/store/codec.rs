//! Record payload encoding.
//!
//! A record's payload is the CBOR encoding of the entity's type name,
//! properties and associations. Identity, lock counter and version tag live
//! in the record header and are not repeated here.

use crate::entity::{Association, EntityId, EntityState, Value};
use crate::error::{CoreError, CoreResult};
use evostore_storage::StoredRecord;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Serialize)]
struct PayloadRef<'a> {
    entity_type: &'a str,
    properties: &'a BTreeMap<String, Value>,
    associations: &'a BTreeMap<String, Association>,
}

#[derive(Deserialize)]
struct Payload {
    entity_type: String,
    #[serde(default)]
    properties: BTreeMap<String, Value>,
    #[serde(default)]
    associations: BTreeMap<String, Association>,
}

/// Encodes the payload of `state`.
pub(crate) fn encode_payload(state: &EntityState) -> CoreResult<Vec<u8>> {
    let payload = PayloadRef {
        entity_type: state.entity_type(),
        properties: state.properties(),
        associations: state.associations(),
    };
    let mut buf = Vec::new();
    ciborium::ser::into_writer(&payload, &mut buf)
        .map_err(|e| CoreError::codec(format!("failed to encode {}: {e}", state.id())))?;
    Ok(buf)
}

/// Rebuilds a loaded state from a stored record.
pub(crate) fn decode_record(record: &StoredRecord) -> CoreResult<EntityState> {
    let payload: Payload = ciborium::de::from_reader(record.payload.as_slice())
        .map_err(|e| CoreError::codec(format!("failed to decode record {}: {e}", record.pk)))?;
    Ok(EntityState::loaded(
        EntityId::new(record.pk),
        payload.entity_type,
        record.version.as_str(),
        record.lock,
        payload.properties,
        payload.associations,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::EntityStatus;

    #[test]
    fn payload_survives_storage() {
        let state = EntityState::new(EntityId::new(9), "Person", "1.1")
            .with_property("name", "Ada")
            .with_property("tags", Value::List(vec![Value::from("a"), Value::Null]))
            .with_association("friends", Association::Many(vec![EntityId::new(2)]));

        let payload = encode_payload(&state).unwrap();
        let record = StoredRecord::new(9, 4, "1.1", payload);
        let loaded = decode_record(&record).unwrap();

        assert_eq!(loaded.id(), EntityId::new(9));
        assert_eq!(loaded.status(), EntityStatus::Loaded);
        assert_eq!(loaded.lock(), 4);
        assert_eq!(loaded.version().as_str(), "1.1");
        assert_eq!(loaded.entity_type(), "Person");
        assert_eq!(loaded.properties(), state.properties());
        assert_eq!(loaded.associations(), state.associations());
    }

    #[test]
    fn garbage_payload_is_codec_error() {
        let record = StoredRecord::new(1, 0, "1.0", vec![0xff, 0x00, 0x13]);
        let err = decode_record(&record).unwrap_err();
        assert!(matches!(err, CoreError::Codec { .. }));
    }
}
