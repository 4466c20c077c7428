//! Parsing and validation of user-supplied block identifiers.
use crate::{
    errors::{Result, UnchainedError},
    iterate::AppearanceMap,
    types::{Appearance, BlockRange, Reason},
};
use web3::types::Address;

/// A validated block identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlockId {
    Number(u32),
    Range(BlockRange),
}

/// Parses identifiers such as `12`, `0x1f` or `100-200`.
///
/// Validation happens before any work begins: at most one range is allowed,
/// and anything unparseable is an [`UnchainedError::InvalidIdentifier`].
pub fn parse_block_ids(inputs: &[String]) -> Result<Vec<BlockId>> {
    if inputs.is_empty() {
        return Err(UnchainedError::Usage(
            "please supply one or more block identifiers".to_string(),
        ));
    }
    let mut ids = vec![];
    let mut ranges = 0;
    for input in inputs {
        if let Some((first, last)) = input.split_once('-') {
            ranges += 1;
            if ranges > 1 {
                return Err(UnchainedError::TooManyRanges);
            }
            let range = BlockRange::new(parse_block_number(first)?, parse_block_number(last)?)?;
            ids.push(BlockId::Range(range));
        } else {
            ids.push(BlockId::Number(parse_block_number(input)?));
        }
    }
    Ok(ids)
}

fn parse_block_number(input: &str) -> Result<u32> {
    let parsed = if let Some(hex_digits) = input.strip_prefix("0x") {
        u32::from_str_radix(hex_digits, 16)
    } else {
        input.parse::<u32>()
    };
    parsed.map_err(|_| UnchainedError::InvalidIdentifier(input.to_string()))
}

/// Expands identifiers to the full list of block numbers, in input order.
pub fn resolve_block_numbers(ids: &[BlockId]) -> Vec<u32> {
    let mut block_numbers = vec![];
    for id in ids {
        match id {
            BlockId::Number(bn) => block_numbers.push(*bn),
            BlockId::Range(range) => block_numbers.extend(range.first..=range.last),
        }
    }
    block_numbers
}

/// Builds an appearance map from block identifiers.
///
/// One appearance is synthesized per block, with transaction index zero and
/// reason `block`; each gets a default value slot.
pub fn appearance_map_from_ids<V: Default>(ids: &[BlockId]) -> Result<AppearanceMap<V>> {
    let apps: Vec<Appearance> = resolve_block_numbers(ids)
        .into_iter()
        .map(|bn| Appearance {
            address: Address::zero(),
            block_number: bn,
            transaction_index: 0,
            reason: Reason::Block,
            timestamp: None,
        })
        .collect();
    Ok(AppearanceMap::new(apps))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(inputs: &[&str]) -> Vec<String> {
        inputs.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn parses_decimal_hex_and_range() {
        let ids = parse_block_ids(&strings(&["12", "0x1f", "100-102"])).unwrap();
        assert_eq!(
            ids,
            vec![
                BlockId::Number(12),
                BlockId::Number(31),
                BlockId::Range(BlockRange::new(100, 102).unwrap()),
            ]
        );
        assert_eq!(resolve_block_numbers(&ids), vec![12, 31, 100, 101, 102]);
    }

    #[test]
    fn rejects_garbage_and_second_range() {
        assert!(matches!(
            parse_block_ids(&strings(&["latest"])),
            Err(UnchainedError::InvalidIdentifier(_))
        ));
        assert!(matches!(
            parse_block_ids(&strings(&["1-2", "3-4"])),
            Err(UnchainedError::TooManyRanges)
        ));
        assert!(matches!(
            parse_block_ids(&[]),
            Err(UnchainedError::Usage(_))
        ));
    }

    #[test]
    fn map_from_ids_synthesizes_block_appearances() {
        let ids = parse_block_ids(&strings(&["3", "1", "2"])).unwrap();
        let map: AppearanceMap<u64> = appearance_map_from_ids(&ids).unwrap();
        let apps = map.appearances();
        let blocks: Vec<u32> = apps.iter().map(|a| a.block_number).collect();
        assert_eq!(blocks, vec![1, 2, 3]);
        assert!(apps.iter().all(|a| a.reason == Reason::Block));
        assert!(apps.iter().all(|a| a.transaction_index == 0));
    }
}
