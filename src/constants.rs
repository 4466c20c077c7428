//! Constants used in the library.
use hex_literal::hex;
use web3::types::{Address, H256};

/// Magic number at the start of every chunk and monitor file.
pub const MAGIC: u32 = 0xdead_beef;

/// Magic number at the start of every bloom file.
pub const BLOOM_MAGIC: u32 = 0xb100_f11e;

/// Width of the chunk file header in bytes.
///
/// Magic (4) + hash (32) + address count (4) + appearance count (4).
pub const HEADER_WIDTH: usize = 44;

/// Number of bytes per address.
pub const ADDR: usize = 20;

/// Width of one address table record: address (20) + offset (4) + count (4).
pub const ADDR_RECORD_WIDTH: usize = 28;

/// Width of one appearance table record: block (4) + transaction index (4).
pub const APP_RECORD_WIDTH: usize = 8;

/// Width of one monitor record: block (4) + transaction index (4) + reason (4).
pub const MONITOR_RECORD_WIDTH: usize = 12;

/// Number of bits in one bloom filter bit array.
pub const BLOOM_WIDTH_IN_BITS: u32 = 1_048_576;

/// Number of bytes in one bloom filter bit array.
pub const BLOOM_WIDTH_IN_BYTES: usize = (BLOOM_WIDTH_IN_BITS / 8) as usize;

/// Number of bit positions derived from one address.
///
/// The twenty address bytes are taken as five big-endian u32 segments, each
/// reduced modulo [`BLOOM_WIDTH_IN_BITS`].
pub const HASHES_PER_ADDRESS: usize = 5;

/// Number of addresses inserted into one filter before a fresh filter is
/// started. Fixed by the index specification; changing it breaks
/// interoperability with published bloom files.
pub const MAX_ADDRS_IN_BLOOM: u32 = 50_000;

/// Hash of the published index specification version, carried in the header
/// of every chunk produced under that version.
pub const SPEC_VERSION_HASH: H256 = H256(hex!(
    "059a8b8ce738cbbdcba4e83e2d5b597c43b251e45a63b6867f67c1710b9d5c33"
));

/// Mainnet chunks whose first block is at or below this boundary predate the
/// header-hash scheme and carry the zero hash instead.
pub const MAINNET_HASH_EXCEPTION_BOUNDARY: u32 = 13_000_000;

/// Placeholder asset address used for native-ether balance rows.
pub const FAKE_ETH_ADDRESS: Address = Address::repeat_byte(0xee);

/// Default worker count for the concurrent appearance iterator.
pub const DEFAULT_WORKERS: usize = 8;

/// Cap on rendered items per chunk when a command runs in test mode.
pub const MAX_TEST_ITEMS: usize = 10_000;
