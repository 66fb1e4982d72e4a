//! Solidity bindings for the read-only token calls the client makes.

use alloy_sol_types::sol;

sol! {
    /// The `version()` and `balanceOf` views of USDC-style tokens.
    ///
    /// References:
    /// - ERC-3009: <https://eips.ethereum.org/EIPS/eip-3009>
    /// - USDC `FiatTokenV2_2`: <https://github.com/circlefin/stablecoin-evm>
    #[allow(missing_docs)]
    #[derive(Debug)]
    interface IEIP3009 {
        function version() external view returns (string);
        function balanceOf(address account) external view returns (uint256);
    }
}

#[cfg(test)]
mod tests {
    use alloy_sol_types::SolCall;

    use super::IEIP3009::{balanceOfCall, versionCall};

    #[test]
    fn test_selectors() {
        assert_eq!(balanceOfCall::SELECTOR, [0x70, 0xa0, 0x82, 0x31]);
        assert_eq!(versionCall::SELECTOR, [0x54, 0xfd, 0x4d, 0x50]);
    }
}
