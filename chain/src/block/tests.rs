use proptest::{collection::vec, prelude::*};

use super::{Block, Hash, Header, Height};
use crate::serialization::{BitcoinDeserializeInto, BitcoinSerialize};

proptest! {
    #[test]
    fn hash_roundtrips(hash in any::<Hash>()) {
        let bytes = hash.bitcoin_serialize_to_vec().unwrap();
        let other: Hash = bytes.bitcoin_deserialize_into().unwrap();
        prop_assert_eq!(hash, other);
    }

    #[test]
    fn hash_display_fromstr_roundtrips(hash in any::<Hash>()) {
        let displayed = format!("{}", hash);
        let parsed: Hash = displayed.parse().unwrap();
        prop_assert_eq!(hash, parsed);
    }

    #[test]
    fn height_roundtrips(height in any::<Height>()) {
        let bytes = height.bitcoin_serialize_to_vec().unwrap();
        let other: Height = bytes.bitcoin_deserialize_into().unwrap();
        prop_assert_eq!(height, other);
    }

    #[test]
    fn header_roundtrips(header in any::<Header>()) {
        let bytes = header.bitcoin_serialize_to_vec();
        let (other, _hash) = Header::deserialize_from_buf(bytes.as_slice())?;
        prop_assert_eq!(header, other);
    }

    #[test]
    fn block_roundtrips(header in any::<Header>(), raw_transactions in vec(any::<u8>(), 0..256)) {
        let block = Block {
            header,
            transaction_count: 0,
            raw_transactions,
        };
        let bytes = block.bitcoin_serialize_to_vec().unwrap();
        let mut buf = bytes::BytesMut::from(&bytes[..]);
        let (other, hash) = Block::deserialize_from_buf(&mut buf)?;
        prop_assert_eq!(block.hash(), hash);
        prop_assert_eq!(block.header, other.header);
        prop_assert_eq!(block.transaction_count, other.transaction_count);
        prop_assert_eq!(block.raw_transactions, other.raw_transactions);
    }
}
