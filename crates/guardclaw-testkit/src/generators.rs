//! Proptest generators for property-based testing.

use proptest::prelude::*;
use serde_json::{Map, Value};

use guardclaw_core::{Envelope, Keypair, RecordType};

use crate::fixtures::ChainBuilder;

/// Generate a random keypair.
pub fn keypair() -> impl Strategy<Value = Keypair> {
    any::<[u8; 32]>().prop_map(|seed| Keypair::from_seed(&seed))
}

/// Generate a record type from the 1.0 registry.
pub fn record_type() -> impl Strategy<Value = RecordType> {
    prop_oneof![
        Just(RecordType::Execution),
        Just(RecordType::Intent),
        Just(RecordType::Result),
        Just(RecordType::Failure),
    ]
}

/// Generate an agent id.
pub fn agent_id() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9-]{0,31}".prop_map(String::from)
}

/// Generate a flat JSON object payload with printable scalar values.
pub fn payload_map() -> impl Strategy<Value = Map<String, Value>> {
    prop::collection::btree_map(
        "[a-z_]{1,12}",
        prop_oneof![
            "[ -~]{0,24}".prop_map(Value::from),
            any::<i64>().prop_map(Value::from),
            any::<bool>().prop_map(Value::from),
        ],
        0..6,
    )
    .prop_map(|entries| entries.into_iter().collect())
}

/// Parameters for generating a whole chained ledger.
#[derive(Debug, Clone)]
pub struct ChainParams {
    pub seed: [u8; 32],
    pub agent_id: String,
    pub entries: Vec<(RecordType, Map<String, Value>)>,
}

impl Arbitrary for ChainParams {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        (
            any::<[u8; 32]>(),
            agent_id(),
            prop::collection::vec((record_type(), payload_map()), 1..8),
        )
            .prop_map(|(seed, agent_id, entries)| ChainParams {
                seed,
                agent_id,
                entries,
            })
            .boxed()
    }
}

/// Build the signed chain described by `params`.
pub fn chain_from_params(params: &ChainParams) -> Vec<Envelope> {
    let mut builder = ChainBuilder::new(Keypair::from_seed(&params.seed), &params.agent_id);
    for (record_type, payload) in &params.entries {
        builder.push(*record_type, payload.clone());
    }
    builder.into_envelopes()
}
