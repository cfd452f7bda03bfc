use alloy::primitives::{B256, b256, keccak256};
use alloy::sol;
use alloy::sol_types::SolEvent;

sol! {
    /// ERC20 fungible transfer.
    event Transfer(address indexed from, address indexed to, uint256 value);
}

/// `Transfer(address,address,uint256)` topic0.
pub const TRANSFER_TOPIC: B256 = Transfer::SIGNATURE_HASH;

/// Module-install event topic0.
pub const MODULE_INSTALLED_TOPIC: B256 =
    b256!("84e86d019bcb2870cd4a319c9e0fa1851216ac61b928f6b09ff7a6f8b2218e12");

/// Resolved name that is escalated like a module install.
pub const DIAMOND_CUT: &str = "DiamondCut";

/// Address-independent event signatures, `(signature, display name)`.
pub const GLOBAL_SIGNATURES: &[(&str, &str)] = &[
    // token standards
    ("Transfer(address,address,uint256)", "Transfer"),
    ("Approval(address,address,uint256)", "Approval"),
    (
        "OwnershipTransferred(address,address)",
        "OwnershipTransferred",
    ),
    (
        "TransferSingle(address,address,address,uint256,uint256)",
        "TransferSingle",
    ),
    (
        "DiamondCut((address,uint8,bytes4[])[],address,bytes)",
        DIAMOND_CUT,
    ),
    // marketplace
    ("MsgInspectorSet(address)", "MsgInspectorSet"),
    (
        "CollateralWithdrawn(uint40,address,uint96)",
        "CollateralWithdrawn",
    ),
    (
        "ColleteralDeposited(uint40,address,uint96)",
        "ColleteralDeposited",
    ),
    (
        "ItemListingCancelled(uint40,address,uint48)",
        "ItemListingCancelled",
    ),
    (
        "ItemPriceUpdated(uint40,address,uint48,uint96,uint96)",
        "ItemPriceUpdated",
    ),
    (
        "ItemSold(uint40,address,address,uint48,uint96,uint96,uint80)",
        "ItemSold",
    ),
    (
        "NewItemListing(uint40,address,uint48,uint256)",
        "NewItemListing",
    ),
    (
        "NewItemListingByAdmin(uint40,address,address,bool,uint48,uint256)",
        "NewItemListingByAdmin",
    ),
    ("ReferralUsed(address,address,uint256)", "ReferralUsed"),
    // groups and installments
    ("groupAdded(address,uint256)", "groupAdded"),
    ("groupDeleted(address,uint256)", "groupDeleted"),
    ("groupDrawed(uint32,uint8,uint40)", "groupDrawed"),
    (
        "groupNftMintedEvent(string,uint32,uint40,uint40[])",
        "groupNftMintedEvent",
    ),
    ("statusUpdated(address,uint256,uint256)", "statusUpdated"),
    (
        "InstallmentImported(uint32,uint8,uint32,uint32)",
        "InstallmentImported",
    ),
    (
        "PxSetGrantAccess(address,address,bytes1[])",
        "PxSetGrantAccess",
    ),
    (
        "PxUpdateGrantAccess(address,address,bytes32)",
        "PxUpdateGrantAccess",
    ),
    // bridge
    (
        "DepositedAndCredited((bytes4,address,uint40))",
        "DepositedAndCredited",
    ),
    (
        "MessageReceived(bytes4,address,uint40,uint256)",
        "MessageReceived",
    ),
    ("Receipt(address,bytes32,bytes)", "Receipt"),
    (
        "Sent((bytes32,uint64,(uint256,uint256)),(uint256,uint256))",
        "Sent",
    ),
    (
        "TransferERC20(address,address,address,uint256)",
        "TransferERC20",
    ),
    // payments
    (
        "firstDepositPaid(address,uint32,uint40,address,uint96,address,uint256,address,uint96,bool)",
        "firstDepositPaid",
    ),
    (
        "installmentPaid(address,uint32,uint40,uint8,uint96)",
        "installmentPaid",
    ),
    (
        "withdrawPaid(address,uint256,uint256,address,address,bool)",
        "withdrawPaid",
    ),
    // collateral
    (
        "CollateralLiquidated(uint40,address,uint256,uint256)",
        "CollateralLiquidated",
    ),
    (
        "CollateralLiquidatedForInstallment(uint40,address,uint256,uint256)",
        "CollateralLiquidatedForInstallment",
    ),
    (
        "ReceivableAllocatedAsCollateral(uint40,address,uint256,uint256,uint256,address)",
        "ReceivableAllocatedAsCollateral",
    ),
    (
        "SwapExecutedWithAmount(uint40,address,address,uint256,uint256)",
        "SwapExecutedWithAmount",
    ),
    (
        "SwapExecutedWithPercentage(uint40,address,address,uint256,uint256)",
        "SwapExecutedWithPercentage",
    ),
    ("rewardsclaimed(address,uint256)", "rewardsclaimed"),
];

/// Hash every global signature into `(topic0, name)` pairs.
pub fn global_topics() -> Vec<(B256, &'static str)> {
    GLOBAL_SIGNATURES
        .iter()
        .map(|(sig, name)| (keccak256(sig.as_bytes()), *name))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transfer_topic_matches_keccak() {
        assert_eq!(
            TRANSFER_TOPIC,
            keccak256("Transfer(address,address,uint256)")
        );
        assert_eq!(
            format!("{TRANSFER_TOPIC:#x}"),
            "0xddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef"
        );
    }

    #[test]
    fn test_global_topics_are_unique() {
        let topics = global_topics();
        let mut hashes: Vec<B256> = topics.iter().map(|(h, _)| *h).collect();
        hashes.sort();
        hashes.dedup();
        assert_eq!(hashes.len(), GLOBAL_SIGNATURES.len());
    }
}
