use chrono::{TimeZone, Utc};
use proptest::prelude::*;

use super::{Hash, Header};

impl Arbitrary for Header {
    type Parameters = ();

    fn arbitrary_with(_args: ()) -> Self::Strategy {
        (
            any::<u32>(),
            any::<Hash>(),
            any::<[u8; 32]>(),
            // time is serialized as a u32 of whole seconds; round through
            // that range so a roundtrip doesn't lose precision proptest
            // can't account for.
            any::<u32>(),
            any::<u32>(),
            any::<u32>(),
        )
            .prop_map(
                |(version, previous_block_hash, merkle_root, timestamp, bits, nonce)| {
                    Header::new(
                        version,
                        previous_block_hash,
                        merkle_root,
                        Utc.timestamp(timestamp as i64, 0),
                        bits,
                        nonce,
                    )
                },
            )
            .boxed()
    }

    type Strategy = BoxedStrategy<Self>;
}
