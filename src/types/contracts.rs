//! Contract bindings for the deployed contract suite.
//!
//! The suite is deployed via deterministic (salt-based) address derivation, so
//! the same logical contract has the same address on every supported chain.
//! Argument order and types are part of the wire contract; call data built from
//! these bindings is byte-exact.

use alloy::sol;

/// Denominator for split percentages. A group of splits whose percents exceed
/// this total cannot be submitted.
pub const SPLITS_TOTAL_PERCENT: u32 = 1_000_000_000;

/// Denominator for reserved/cash-out rates expressed in basis points.
pub const MAX_FEE_PERCENT: u16 = 10_000;

sol! {
    /// A single payout or reserved-token split.
    #[derive(Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
    struct Split {
        /// Portion of the group total, out of [`SPLITS_TOTAL_PERCENT`].
        uint32 percent;
        /// Recipient of this split.
        address beneficiary;
        /// Project to route this split to instead of a beneficiary, if any.
        uint64 projectId;
        /// Timestamp the split is locked until.
        uint48 lockedUntil;
    }

    /// A group of splits sharing one purpose (payouts, reserved tokens).
    #[derive(Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
    struct SplitGroup {
        /// Group discriminator.
        uint256 groupId;
        /// The splits of the group.
        Split[] splits;
    }

    /// Off-chain project metadata pointer.
    #[derive(Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
    struct ProjectMetadata {
        /// IPFS URI of the metadata document.
        string uri;
        /// Metadata domain.
        uint256 domain;
    }

    /// Configuration of one ruleset.
    #[derive(Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
    struct RulesetConfig {
        /// Earliest timestamp the ruleset may start at.
        uint48 mustStartAtOrAfter;
        /// Ruleset duration in seconds. Zero means unbounded.
        uint32 duration;
        /// Token issuance weight.
        uint112 weight;
        /// Issuance cut applied between rulesets, out of [`MAX_FEE_PERCENT`].
        uint16 weightCutPercent;
        /// Hook consulted before the next ruleset takes effect.
        address approvalHook;
        /// Portion of issuance reserved for splits, out of [`MAX_FEE_PERCENT`].
        uint16 reservedPercent;
        /// Tax applied on cash-outs, out of [`MAX_FEE_PERCENT`].
        uint16 cashOutTaxRate;
        /// Split groups active during the ruleset.
        SplitGroup[] splitGroups;
    }

    /// Terminal accepted by a project along with the tokens it takes.
    #[derive(Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
    struct TerminalConfig {
        /// The terminal contract.
        address terminal;
        /// Tokens the terminal accepts for the project.
        address[] tokensToAccept;
    }

    /// Configuration of one NFT tier.
    #[derive(Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
    struct TierConfig {
        /// Price of the tier in the hook's pricing currency.
        uint104 price;
        /// Number of units initially mintable.
        uint32 initialSupply;
        /// Reserved-mint frequency; one reserved mint per this many mints.
        uint16 reservedFrequency;
        /// Beneficiary of reserved mints.
        address reservedBeneficiary;
        /// Encoded IPFS URI of the tier art.
        bytes32 encodedIPFSUri;
        /// Tier category.
        uint24 category;
    }

    /// Payment terminal surface.
    interface ITerminal {
        function pay(
            uint256 projectId,
            address token,
            uint256 amount,
            address beneficiary,
            uint256 minReturnedTokens,
            string memo,
            bytes metadata
        ) external payable returns (uint256);

        function cashOutTokensOf(
            address holder,
            uint256 projectId,
            uint256 cashOutCount,
            address tokenToReclaim,
            uint256 minTokensReclaimed,
            address beneficiary,
            bytes metadata
        ) external returns (uint256);

        function useAllowanceOf(
            uint256 projectId,
            address token,
            uint256 amount,
            uint256 currency,
            uint256 minTokensPaidOut,
            address beneficiary,
            address feeBeneficiary,
            string memo
        ) external returns (uint256);
    }

    /// Project controller surface.
    interface IController {
        function queueRulesetsOf(
            uint256 projectId,
            RulesetConfig[] configs,
            string memo
        ) external returns (uint256);

        function launchProjectFor(
            address owner,
            ProjectMetadata meta,
            RulesetConfig[] configs,
            TerminalConfig[] terminals,
            string memo
        ) external;
    }

    /// Cross-chain peer deployer surface.
    interface ISuckerRegistry {
        function deploySuckersFor(
            uint256 projectId,
            bytes32 salt,
            bytes[] deployerConfigurations
        ) external returns (address[]);
    }

    /// Revnet deployer surface.
    interface IRevnetDeployer {
        function deployFor(
            address owner,
            ProjectMetadata meta,
            RulesetConfig[] configs,
            TerminalConfig[] terminals,
            bytes32 salt,
            string memo
        ) external returns (uint256);
    }

    /// Tiered NFT hook surface.
    interface ITieredHook {
        function adjustTiers(
            TierConfig[] tiersToAdd,
            uint256[] tierIdsToRemove
        ) external;
    }

    /// Directory of authoritative contracts per project.
    #[sol(rpc)]
    interface IDirectory {
        function primaryTerminalOf(uint256 projectId, address token) external view returns (address);
        function controllerOf(uint256 projectId) external view returns (address);
    }

    #[sol(rpc)]
    #[derive(Debug)]
    interface IERC20 {
        function allowance(address owner, address spender) external view returns (uint256);
        function approve(address spender, uint256 amount) external returns (bool);
        function balanceOf(address owner) external view returns (uint256);
        function decimals() external view returns (uint8);
    }

    /// Permit registry allowance surface.
    #[sol(rpc)]
    interface IAllowanceTransfer {
        function allowance(address user, address token, address spender)
            external
            view
            returns (uint160 amount, uint48 expiration, uint48 nonce);

        function approve(address token, address spender, uint160 amount, uint48 expiration) external;
    }

    /// The token and amount details of a gasless allowance.
    #[derive(Debug, Default, PartialEq, Eq, serde::Serialize)]
    struct PermitDetails {
        /// ERC-20 token address.
        address token;
        /// Amount of tokens the spender may move.
        uint160 amount;
        /// Timestamp after which the allowance is void.
        uint48 expiration;
        /// One-time nonce, read from the registry.
        uint48 nonce;
    }

    /// The signed gasless allowance message, bound to a spender and chain.
    #[derive(Debug, Default, PartialEq, Eq, serde::Serialize)]
    struct PermitSingle {
        /// The allowance details.
        PermitDetails details;
        /// The address allowed to spend.
        address spender;
        /// Deadline after which the signature itself is void.
        uint256 sigDeadline;
    }

    /// Opaque metadata payload embedding a signed allowance for the first call
    /// of a payment operation.
    #[derive(Debug, PartialEq, Eq)]
    struct PermitPayload {
        /// The signed allowance message.
        PermitSingle permit;
        /// Raw signature bytes.
        bytes signature;
    }
}
