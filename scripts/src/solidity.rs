//! Definitions of Solidity functions called during deployment

use alloy::sol;

sol! {
    /// The admin contract owning every transparent proxy on a network
    interface IProxyAdmin {
        function upgrade(address proxy, address implementation) external;
        function upgradeAndCall(address proxy, address implementation, bytes memory data) external payable;
    }
}
