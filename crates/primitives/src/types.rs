/// Index of a signer within the ordered federation key list.
pub type SignerIdx = u32;

/// Height of a block in the sidechain.
pub type SidechainBlockHeight = u64;

/// Height of a block in the parent chain.
pub type ParentBlockHeight = u64;
