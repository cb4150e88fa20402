//! Dynamic decoding of events and dispatch errors.

use crate::codec::Decoder;
use crate::metadata::{Metadata, TypeDefinition, TypeId};
use crate::value::{decode_value, Value};
use crate::{Error, Result};
use log::trace;
use std::fmt;

/// An event decoded from its pallet and event index.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedEvent {
    pub pallet: String,
    pub pallet_index: u8,
    /// The event variant of the pallet, named after the event.
    pub event: Value<TypeId>,
}

impl DecodedEvent {
    pub fn name(&self) -> &str {
        self.event.variant_name().unwrap_or_default()
    }
    pub fn is(&self, pallet: &str, event: &str) -> bool {
        self.pallet == pallet && self.name() == event
    }
    /// Whether this is `System.ExtrinsicFailed`, emitted when the dispatch
    /// of an included extrinsic failed.
    pub fn is_extrinsic_failed(&self) -> bool {
        self.is("System", "ExtrinsicFailed")
    }
    /// The `DispatchError` of a `System.ExtrinsicFailed` event.
    pub fn dispatch_error(&self) -> Option<&Value<TypeId>> {
        if !self.is_extrinsic_failed() {
            return None;
        }

        self.event
            .at("dispatch_error")
            .or_else(|| self.event.index(0))
    }
    /// Resolves the failure reported by a `System.ExtrinsicFailed` event.
    pub fn dispatch_failure(&self, metadata: &Metadata) -> Result<Option<DispatchFailure>> {
        match self.dispatch_error() {
            Some(err) => DispatchFailure::from_value(metadata, err).map(Some),
            None => Ok(None),
        }
    }
}

/// An entry of `System.Events`.
#[derive(Debug, Clone, PartialEq)]
pub struct EventRecord {
    pub phase: Value<TypeId>,
    pub event: DecodedEvent,
    pub topics: Vec<Value<TypeId>>,
}

impl EventRecord {
    /// Index of the extrinsic that emitted the event, if it was emitted
    /// while applying one.
    pub fn extrinsic_index(&self) -> Option<u32> {
        match self.phase.variant_name() {
            Some("ApplyExtrinsic") => self
                .phase
                .index(0)
                .and_then(|v| v.as_u128())
                .map(|idx| idx as u32),
            _ => None,
        }
    }
}

/// An error raised by a pallet, resolved by its pallet and error index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleError {
    pub pallet: String,
    pub pallet_index: u8,
    pub error: String,
    pub error_index: u8,
    pub docs: Vec<String>,
}

impl fmt::Display for ModuleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.pallet, self.error)
    }
}

/// Why the dispatch of an extrinsic failed.
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchFailure {
    Module(ModuleError),
    /// Any other `DispatchError` arm, such as `BadOrigin`.
    Other(Value<TypeId>),
}

impl DispatchFailure {
    /// Resolves a decoded `DispatchError`.
    pub fn from_value(metadata: &Metadata, err: &Value<TypeId>) -> Result<Self> {
        match module_error(metadata, err)? {
            Some(module) => Ok(DispatchFailure::Module(module)),
            None => Ok(DispatchFailure::Other(err.clone().into())),
        }
    }
}

/// Resolves the `Module` arm of a `DispatchError` into the pallet and error
/// it names. Other arms yield `None`.
///
/// Both the current layout, where the error is four bytes of which the first
/// is the error index, and the older single byte layout are accepted.
pub fn module_error<C>(metadata: &Metadata, err: &Value<C>) -> Result<Option<ModuleError>> {
    let variant = match err.as_variant() {
        Some(variant) if variant.name == "Module" => variant,
        _ => return Ok(None),
    };

    let inner = match variant.fields.get("index") {
        Some(_) => err,
        None => variant
            .fields
            .values()
            .next()
            .ok_or(Error::MissingMetadataType("DispatchError::Module fields"))?,
    };

    let pallet_index = inner
        .at("index")
        .and_then(|v| v.as_u128())
        .ok_or(Error::MissingMetadataType("ModuleError::index"))? as u8;
    let error_index = inner
        .at("error")
        .and_then(|v| {
            v.as_u128()
                .map(|idx| idx as u8)
                .or_else(|| v.as_bytes().and_then(|b| b.first().copied()))
        })
        .ok_or(Error::MissingMetadataType("ModuleError::error"))?;

    let info = metadata
        .error_by_index(pallet_index, error_index)
        .ok_or_else(|| match metadata.pallet_by_index(pallet_index) {
            Some(pallet) => Error::ItemNotFound {
                kind: "error",
                pallet: pallet.name().to_string(),
                name: error_index.to_string(),
            },
            None => Error::UnknownPalletIndex(pallet_index),
        })?;

    Ok(Some(ModuleError {
        pallet: info.pallet.name().to_string(),
        pallet_index,
        error: info.variant.name.clone(),
        error_index,
        docs: info.variant.docs.clone(),
    }))
}

/// Decodes a single event from the whole of `bytes`.
pub fn decode_event(metadata: &Metadata, bytes: &[u8]) -> Result<DecodedEvent> {
    let mut decoder = Decoder::new(bytes);
    let event = decode_event_from(metadata, &mut decoder)?;
    decoder.finish()?;
    Ok(event)
}

/// Decodes an event from the front of the decoder, in the layout of the
/// runtime event enum.
pub fn decode_event_from(metadata: &Metadata, decoder: &mut Decoder<'_>) -> Result<DecodedEvent> {
    let pallet_index = decoder.read_byte()?;
    let pallet = metadata
        .pallet_by_index(pallet_index)
        .ok_or(Error::UnknownPalletIndex(pallet_index))?;
    let events = pallet.events().ok_or_else(|| Error::ItemNotFound {
        kind: "event",
        pallet: pallet.name().to_string(),
        name: String::new(),
    })?;

    let event = decode_value(decoder, events.ty(), metadata.types())?;
    trace!(
        "Decoded event {}::{}",
        pallet.name(),
        event.variant_name().unwrap_or_default()
    );

    Ok(DecodedEvent {
        pallet: pallet.name().to_string(),
        pallet_index,
        event,
    })
}

/// Decodes the value of `System.Events`.
pub fn decode_events(metadata: &Metadata, raw: &[u8]) -> Result<Vec<EventRecord>> {
    let types = metadata.types();
    let entry = metadata
        .storage("System", "Events")
        .ok_or(Error::MissingMetadataType("System::Events"))?;

    let record_fields = match types.resolve(entry.value_ty) {
        Some(TypeDefinition::Sequence(record)) => match types.resolve(*record) {
            Some(TypeDefinition::Composite(fields)) => fields,
            _ => return Err(Error::MissingMetadataType("EventRecord")),
        },
        _ => return Err(Error::MissingMetadataType("System::Events")),
    };
    let field_ty = |name: &str| {
        record_fields
            .iter()
            .find(|f| f.name.as_deref() == Some(name))
            .map(|f| f.ty)
    };
    let (phase_ty, topics_ty) = match (field_ty("phase"), field_ty("topics")) {
        (Some(phase), Some(topics)) => (phase, topics),
        _ => return Err(Error::MissingMetadataType("EventRecord")),
    };

    let mut decoder = Decoder::new(raw);
    let len = decoder.read_compact_len()?;
    let mut records = Vec::with_capacity(len.min(raw.len()));
    for _ in 0..len {
        let phase = decode_value(&mut decoder, phase_ty, types)?;
        let event = decode_event_from(metadata, &mut decoder)?;
        let topics = match decode_value(&mut decoder, topics_ty, types)?.value {
            crate::value::ValueDef::Sequence(topics) => topics,
            _ => vec![],
        };

        records.push(EventRecord {
            phase,
            event,
            topics,
        });
    }
    decoder.finish()?;

    Ok(records)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::metadata::testing::MetadataBuilder;
    use crate::metadata::version::portable::TypeDefPrimitive;

    /// System (0) with `ExtrinsicSuccess`/`ExtrinsicFailed` and `Events`,
    /// Balances (5) with a `Transfer` event and errors.
    pub(crate) fn system() -> MetadataBuilder {
        let mut b = MetadataBuilder::new();
        let u8_ty = b.primitive(TypeDefPrimitive::U8);
        let u32_ty = b.primitive(TypeDefPrimitive::U32);
        let u128_ty = b.primitive(TypeDefPrimitive::U128);
        let account = b.account_id();
        let error_bytes = b.array(u8_ty, 4);
        let hash = b.array(u8_ty, 32);

        let module_error = b.composite(
            &["sp_runtime", "ModuleError"],
            &[(Some("index"), u8_ty), (Some("error"), error_bytes)],
        );
        let dispatch_error = b.variant(
            &["sp_runtime", "DispatchError"],
            &[
                ("Other", 0, &[]),
                ("BadOrigin", 2, &[]),
                ("Module", 3, &[(None, module_error)]),
            ],
        );
        let system_events = b.variant(
            &["frame_system", "pallet", "Event"],
            &[
                ("ExtrinsicSuccess", 0, &[(Some("dispatch_info"), u32_ty)]),
                (
                    "ExtrinsicFailed",
                    1,
                    &[(Some("dispatch_error"), dispatch_error), (Some("dispatch_info"), u32_ty)],
                ),
            ],
        );
        let balances_events = b.variant(
            &["pallet_balances", "pallet", "Event"],
            &[(
                "Transfer",
                2,
                &[(Some("from"), account), (Some("to"), account), (Some("amount"), u128_ty)],
            )],
        );
        let balances_errors = b.variant(
            &["pallet_balances", "pallet", "Error"],
            &[("VestingBalance", 0, &[]), ("InsufficientBalance", 2, &[])],
        );

        let runtime_event = b.variant(
            &["runtime", "RuntimeEvent"],
            &[
                ("System", 0, &[(None, system_events)]),
                ("Balances", 5, &[(None, balances_events)]),
            ],
        );
        let phase = b.variant(
            &["frame_system", "Phase"],
            &[("ApplyExtrinsic", 0, &[(None, u32_ty)]), ("Finalization", 1, &[])],
        );
        let topics = b.sequence(hash);
        let record = b.composite(
            &["frame_system", "EventRecord"],
            &[(Some("phase"), phase), (Some("event"), runtime_event), (Some("topics"), topics)],
        );
        let records = b.sequence(record);

        b.pallet("System", 0)
            .events(system_events)
            .plain_storage("Events", records);
        b.pallet("Balances", 5)
            .events(balances_events)
            .errors(balances_errors);
        b
    }

    fn metadata() -> Metadata {
        Metadata::from_bytes(&system().build_v14()).unwrap()
    }

    // `System.ExtrinsicFailed` with `Module { index: 5, error: [2, 0, 0, 0] }`.
    const FAILED: [u8; 12] = [0, 1, 3, 5, 2, 0, 0, 0, 0x10, 0, 0, 0];

    #[test]
    fn extrinsic_failed_resolves_module_error() {
        let meta = metadata();
        let event = decode_event(&meta, &FAILED).unwrap();

        assert!(event.is_extrinsic_failed());
        assert_eq!(
            event.dispatch_failure(&meta).unwrap(),
            Some(DispatchFailure::Module(ModuleError {
                pallet: "Balances".into(),
                pallet_index: 5,
                error: "InsufficientBalance".into(),
                error_index: 2,
                docs: vec![],
            }))
        );
    }

    #[test]
    fn other_dispatch_errors() {
        let meta = metadata();
        let event = decode_event(&meta, &[0, 1, 2, 0x10, 0, 0, 0]).unwrap();

        match event.dispatch_failure(&meta).unwrap() {
            Some(DispatchFailure::Other(err)) => assert_eq!(err.variant_name(), Some("BadOrigin")),
            other => panic!("unexpected failure: {:?}", other),
        }

        let success = decode_event(&meta, &[0, 0, 1, 0, 0, 0]).unwrap();
        assert!(!success.is_extrinsic_failed());
        assert_eq!(success.dispatch_failure(&meta).unwrap(), None);
    }

    #[test]
    fn unknown_module_errors() {
        let meta = metadata();

        let unknown_error = decode_event(&meta, &[0, 1, 3, 5, 7, 0, 0, 0, 0, 0, 0, 0]).unwrap();
        assert!(matches!(
            unknown_error.dispatch_failure(&meta),
            Err(Error::ItemNotFound { kind: "error", .. })
        ));

        let unknown_pallet = decode_event(&meta, &[0, 1, 3, 9, 0, 0, 0, 0, 0, 0, 0, 0]).unwrap();
        assert!(matches!(
            unknown_pallet.dispatch_failure(&meta),
            Err(Error::UnknownPalletIndex(9))
        ));
    }

    #[test]
    fn decode_system_events() {
        let meta = metadata();

        let mut raw = vec![8];
        // ApplyExtrinsic(1), Balances::Transfer, no topics.
        raw.extend_from_slice(&[0, 1, 0, 0, 0, 5, 2]);
        raw.extend_from_slice(&[1; 32]);
        raw.extend_from_slice(&[2; 32]);
        raw.extend_from_slice(&50u128.to_le_bytes());
        raw.push(0);
        // ApplyExtrinsic(1), System::ExtrinsicFailed, one topic.
        raw.extend_from_slice(&[0, 1, 0, 0, 0]);
        raw.extend_from_slice(&FAILED);
        raw.push(4);
        raw.extend_from_slice(&[9; 32]);

        let records = decode_events(&meta, &raw).unwrap();
        assert_eq!(records.len(), 2);
        assert!(records[0].event.is("Balances", "Transfer"));
        assert_eq!(
            records[0].event.event.at("amount").and_then(|v| v.as_u128()),
            Some(50)
        );
        assert_eq!(records[0].extrinsic_index(), Some(1));
        assert!(records[1].event.is_extrinsic_failed());
        assert_eq!(records[1].topics.len(), 1);

        assert!(matches!(decode_events(&meta, &raw[..raw.len() - 1]), Err(Error::Codec(_))));
    }
}
