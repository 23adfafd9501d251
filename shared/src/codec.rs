//! Binary wire format for entities and state messages.
//!
//! All integers are big-endian and fixed width:
//!
//! ```text
//! json blob   = u16 length ++ JSON bytes
//! metadata    = u8 alive ++ json blob
//! blocks      = u32 #new ++ u32 #old ++ (u16 x, u16 y) * #new ++ (u16 x, u16 y) * #old
//! entity      = metadata ++ blocks
//! list        = u32 count ++ entity * count
//! message     = entity (player) ++ list (other snakes) ++ list * (one per kind)
//! ```
//!
//! The number of kind lists is not transmitted; decoders read lists until the
//! input is exhausted.

use bincode::Options;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::entity::{Block, Entity, Metadata};
use crate::error::{CodecError, CodecResult};

/// An empty block run, for entities with nothing to report on one side.
pub const NO_BLOCKS: &[Block] = &[];

/// Fixed-width big-endian options shared by every integer field.
fn wire() -> impl Options {
    bincode::DefaultOptions::new()
        .with_big_endian()
        .with_fixint_encoding()
        .allow_trailing_bytes()
}

#[derive(Serialize, Deserialize)]
struct WireBlock(u16, u16);

impl TryFrom<Block> for WireBlock {
    type Error = CodecError;

    fn try_from(block: Block) -> CodecResult<Self> {
        match (u16::try_from(block.x), u16::try_from(block.y)) {
            (Ok(x), Ok(y)) => Ok(WireBlock(x, y)),
            _ => Err(CodecError::CoordinateOutOfRange(block)),
        }
    }
}

impl From<WireBlock> for Block {
    fn from(WireBlock(x, y): WireBlock) -> Self {
        Block::new(i32::from(x), i32::from(y))
    }
}

fn write_field<T: Serialize>(out: &mut Vec<u8>, value: &T) -> CodecResult<()> {
    wire().serialize_into(out, value)?;
    Ok(())
}

fn read_field<T: DeserializeOwned>(input: &mut &[u8]) -> CodecResult<T> {
    Ok(wire().deserialize_from(input)?)
}

fn count_u32(len: usize) -> CodecResult<u32> {
    u32::try_from(len).map_err(|_| CodecError::TooManyItems(len))
}

fn take<'a>(input: &mut &'a [u8], needed: usize) -> CodecResult<&'a [u8]> {
    if input.len() < needed {
        return Err(CodecError::Truncated {
            needed,
            available: input.len(),
        });
    }
    let slice: &'a [u8] = *input;
    let (head, rest) = slice.split_at(needed);
    *input = rest;
    Ok(head)
}

/// Appends `value` as JSON behind a 2-byte length.
pub fn encode_json_blob<T: Serialize + ?Sized>(out: &mut Vec<u8>, value: &T) -> CodecResult<()> {
    let data = serde_json::to_vec(value)?;
    let len = u16::try_from(data.len()).map_err(|_| CodecError::BlobTooLarge(data.len()))?;
    write_field(out, &len)?;
    out.extend_from_slice(&data);
    Ok(())
}

/// Alive flag followed by the metadata blob.
pub fn encode_metadata(out: &mut Vec<u8>, alive: bool, metadata: &Metadata) -> CodecResult<()> {
    write_field(out, &alive)?;
    encode_json_blob(out, metadata)
}

/// Both block counts, then every new block, then every old block.
pub fn encode_blocks<'a, N, O>(out: &mut Vec<u8>, new: N, old: O) -> CodecResult<()>
where
    N: IntoIterator<Item = &'a Block>,
    N::IntoIter: ExactSizeIterator,
    O: IntoIterator<Item = &'a Block>,
    O::IntoIter: ExactSizeIterator,
{
    let new = new.into_iter();
    let old = old.into_iter();
    write_field(out, &(count_u32(new.len())?, count_u32(old.len())?))?;
    for block in new.chain(old) {
        write_field(out, &WireBlock::try_from(*block)?)?;
    }
    Ok(())
}

/// An entity's header with externally supplied blocks.
pub fn encode_partial_entity<'a, N, O>(
    out: &mut Vec<u8>,
    alive: bool,
    metadata: &Metadata,
    new: N,
    old: O,
) -> CodecResult<()>
where
    N: IntoIterator<Item = &'a Block>,
    N::IntoIter: ExactSizeIterator,
    O: IntoIterator<Item = &'a Block>,
    O::IntoIter: ExactSizeIterator,
{
    encode_metadata(out, alive, metadata)?;
    encode_blocks(out, new, old)
}

/// An entity with all of its blocks as new.
pub fn encode_whole_entity(out: &mut Vec<u8>, entity: &Entity) -> CodecResult<()> {
    encode_partial_entity(out, entity.alive, &entity.metadata, &entity.blocks, NO_BLOCKS)
}

/// Writes a counted list of entities. The count is patched in on
/// [`ListEncoder::finish`], so entries can be streamed from any iterator.
pub struct ListEncoder<'a> {
    out: &'a mut Vec<u8>,
    count_at: usize,
    count: usize,
}

impl<'a> ListEncoder<'a> {
    pub fn begin(out: &'a mut Vec<u8>) -> Self {
        let count_at = out.len();
        out.extend_from_slice(&[0; 4]);
        Self {
            out,
            count_at,
            count: 0,
        }
    }

    pub fn push_partial<'b, N, O>(
        &mut self,
        alive: bool,
        metadata: &Metadata,
        new: N,
        old: O,
    ) -> CodecResult<()>
    where
        N: IntoIterator<Item = &'b Block>,
        N::IntoIter: ExactSizeIterator,
        O: IntoIterator<Item = &'b Block>,
        O::IntoIter: ExactSizeIterator,
    {
        encode_partial_entity(self.out, alive, metadata, new, old)?;
        self.count += 1;
        Ok(())
    }

    pub fn push_whole(&mut self, entity: &Entity) -> CodecResult<()> {
        encode_whole_entity(self.out, entity)?;
        self.count += 1;
        Ok(())
    }

    pub fn finish(self) -> CodecResult<()> {
        let ListEncoder {
            out,
            count_at,
            count,
        } = self;
        out[count_at..count_at + 4].copy_from_slice(&count_u32(count)?.to_be_bytes());
        Ok(())
    }
}

/// Legacy block dump: alive flag followed by a single blocks section.
pub fn encode_blocks_message<'a, N, O>(alive: bool, new: N, old: O) -> CodecResult<Vec<u8>>
where
    N: IntoIterator<Item = &'a Block>,
    N::IntoIter: ExactSizeIterator,
    O: IntoIterator<Item = &'a Block>,
    O::IntoIter: ExactSizeIterator,
{
    let mut out = Vec::new();
    write_field(&mut out, &alive)?;
    encode_blocks(&mut out, new, old)?;
    Ok(out)
}

/// One decoded entity: header plus its new and old blocks.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityRecord {
    pub alive: bool,
    pub metadata: Metadata,
    pub added: Vec<Block>,
    pub removed: Vec<Block>,
}

impl EntityRecord {
    pub fn name(&self) -> Option<&str> {
        self.metadata.get("name").and_then(|n| n.as_str())
    }
}

/// A decoded full or updated state message.
#[derive(Debug, Clone, PartialEq)]
pub struct StateMessage {
    pub player: EntityRecord,
    pub snakes: Vec<EntityRecord>,
    /// One list per non-snake kind, in wire order.
    pub kinds: Vec<Vec<EntityRecord>>,
}

/// A decoded legacy block dump.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlocksMessage {
    pub alive: bool,
    pub added: Vec<Block>,
    pub removed: Vec<Block>,
}

pub fn decode_json_blob<T: DeserializeOwned>(input: &mut &[u8]) -> CodecResult<T> {
    let len: u16 = read_field(input)?;
    let data = take(input, usize::from(len))?;
    Ok(serde_json::from_slice(data)?)
}

fn decode_block_run(input: &mut &[u8], count: u32) -> CodecResult<Vec<Block>> {
    let count = count as usize;
    // each block is 4 bytes; don't trust the count for the allocation
    let mut blocks = Vec::with_capacity(count.min(input.len() / 4));
    for _ in 0..count {
        let block: WireBlock = read_field(input)?;
        blocks.push(block.into());
    }
    Ok(blocks)
}

pub fn decode_blocks(input: &mut &[u8]) -> CodecResult<(Vec<Block>, Vec<Block>)> {
    let (new_len, old_len): (u32, u32) = read_field(input)?;
    let new = decode_block_run(input, new_len)?;
    let old = decode_block_run(input, old_len)?;
    Ok((new, old))
}

pub fn decode_entity(input: &mut &[u8]) -> CodecResult<EntityRecord> {
    let alive: bool = read_field(input)?;
    let metadata = decode_json_blob(input)?;
    let (added, removed) = decode_blocks(input)?;
    Ok(EntityRecord {
        alive,
        metadata,
        added,
        removed,
    })
}

pub fn decode_list(input: &mut &[u8]) -> CodecResult<Vec<EntityRecord>> {
    let count: u32 = read_field(input)?;
    let mut records = Vec::new();
    for _ in 0..count {
        records.push(decode_entity(input)?);
    }
    Ok(records)
}

pub fn decode_state_message(bytes: &[u8]) -> CodecResult<StateMessage> {
    let mut input = bytes;
    let player = decode_entity(&mut input)?;
    let snakes = decode_list(&mut input)?;
    let mut kinds = Vec::new();
    while !input.is_empty() {
        kinds.push(decode_list(&mut input)?);
    }
    Ok(StateMessage {
        player,
        snakes,
        kinds,
    })
}

pub fn decode_blocks_message(bytes: &[u8]) -> CodecResult<BlocksMessage> {
    let mut input = bytes;
    let alive: bool = read_field(&mut input)?;
    let (added, removed) = decode_blocks(&mut input)?;
    Ok(BlocksMessage {
        alive,
        added,
        removed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::empty_metadata;
    use serde_json::json;

    #[test]
    fn test_json_blob_layout() {
        let mut out = Vec::new();
        encode_json_blob(&mut out, &json!({"a": 1})).unwrap();
        assert_eq!(&out[..2], &[0x00, 0x07]);
        assert_eq!(&out[2..], br#"{"a":1}"#);

        let mut input = out.as_slice();
        let value: Metadata = decode_json_blob(&mut input).unwrap();
        assert_eq!(value, json!({"a": 1}));
        assert!(input.is_empty());
    }

    #[test]
    fn test_json_blob_too_large() {
        let big = "x".repeat(70_000);
        let mut out = Vec::new();
        assert!(matches!(
            encode_json_blob(&mut out, &big),
            Err(CodecError::BlobTooLarge(_))
        ));
    }

    #[test]
    fn test_metadata_layout() {
        let mut out = Vec::new();
        encode_metadata(&mut out, true, &empty_metadata()).unwrap();
        assert_eq!(out, vec![0x01, 0x00, 0x02, b'{', b'}']);

        out.clear();
        encode_metadata(&mut out, false, &empty_metadata()).unwrap();
        assert_eq!(out[0], 0x00);
    }

    #[test]
    fn test_blocks_layout() {
        let mut out = Vec::new();
        encode_blocks(
            &mut out,
            &[Block::new(1, 2), Block::new(258, 3)],
            &[Block::new(4, 5)],
        )
        .unwrap();
        assert_eq!(
            out,
            vec![
                0, 0, 0, 2, // new count
                0, 0, 0, 1, // old count
                0, 1, 0, 2, // (1, 2)
                1, 2, 0, 3, // (258, 3)
                0, 4, 0, 5, // (4, 5)
            ]
        );
    }

    #[test]
    fn test_negative_coordinate_rejected() {
        let mut out = Vec::new();
        let result = encode_blocks(&mut out, &[Block::new(-1, 0)], NO_BLOCKS);
        assert!(matches!(result, Err(CodecError::CoordinateOutOfRange(_))));
    }

    #[test]
    fn test_whole_entity_roundtrip() {
        let snake = Entity::snake(Block::new(7, 4), "roundtrip", None);
        let mut out = Vec::new();
        encode_whole_entity(&mut out, &snake).unwrap();

        let mut input = out.as_slice();
        let record = decode_entity(&mut input).unwrap();
        assert!(input.is_empty());
        assert!(record.alive);
        assert_eq!(record.metadata, snake.metadata);
        assert_eq!(record.added, snake.blocks.iter().copied().collect::<Vec<_>>());
        assert!(record.removed.is_empty());
        assert_eq!(record.name(), Some("roundtrip"));
    }

    #[test]
    fn test_list_encoder_patches_count() {
        let mut out = Vec::new();
        let mut list = ListEncoder::begin(&mut out);
        list.push_whole(&Entity::food(Block::new(1, 1))).unwrap();
        list.push_partial(false, &empty_metadata(), NO_BLOCKS, &[Block::new(2, 2)])
            .unwrap();
        list.finish().unwrap();
        assert_eq!(&out[..4], &[0, 0, 0, 2]);

        let mut input = out.as_slice();
        let records = decode_list(&mut input).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].added, vec![Block::new(1, 1)]);
        assert!(!records[1].alive);
        assert_eq!(records[1].removed, vec![Block::new(2, 2)]);
    }

    #[test]
    fn test_state_message_reads_all_trailing_kind_lists() {
        let player = Entity::snake(Block::new(5, 5), "me", None);
        let mut out = Vec::new();
        encode_whole_entity(&mut out, &player).unwrap();
        ListEncoder::begin(&mut out).finish().unwrap();
        for n in 0..3 {
            let mut list = ListEncoder::begin(&mut out);
            for i in 0..n {
                list.push_whole(&Entity::food(Block::new(i, i))).unwrap();
            }
            list.finish().unwrap();
        }

        let message = decode_state_message(&out).unwrap();
        assert_eq!(message.player.name(), Some("me"));
        assert!(message.snakes.is_empty());
        assert_eq!(message.kinds.len(), 3);
        assert_eq!(
            message.kinds.iter().map(Vec::len).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );
    }

    #[test]
    fn test_truncated_message_is_an_error() {
        let snake = Entity::snake(Block::new(5, 5), "cut", None);
        let mut out = Vec::new();
        encode_whole_entity(&mut out, &snake).unwrap();
        ListEncoder::begin(&mut out).finish().unwrap();

        for cut in [1, 3, out.len() - 5, out.len() - 1] {
            assert!(decode_state_message(&out[..cut]).is_err(), "cut at {}", cut);
        }
    }

    #[test]
    fn test_huge_count_does_not_preallocate() {
        let bytes = [0xff, 0xff, 0xff, 0xff, 0, 0, 0, 0];
        let mut input = &bytes[..];
        assert!(decode_blocks(&mut input).is_err());
    }

    #[test]
    fn test_blocks_message() {
        let bytes = encode_blocks_message(true, &[Block::new(3, 4)], NO_BLOCKS).unwrap();
        assert_eq!(bytes[0], 0x01);
        let message = decode_blocks_message(&bytes).unwrap();
        assert!(message.alive);
        assert_eq!(message.added, vec![Block::new(3, 4)]);
        assert!(message.removed.is_empty());
    }
}
