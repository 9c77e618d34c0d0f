use alloy_sol_types::sol;

sol! {
    #[derive(Debug, PartialEq, Eq)]
    interface IZKOracle {
        /// @notice Emitted when a block hash attestation is requested.
        /// @param request identifier of the request
        /// @param number number of the block to attest
        event BlockRequested(uint256 indexed request, uint256 indexed number);

        /// @notice Gets the index of the current aggregator.
        function getAggregator() external view returns (uint256);

        /// @notice Gets the network address registered for a participant.
        /// @param index index of the participant
        /// @return the address votes are sent to, usually `host:port`
        function getIPAddress(uint256 index) external view returns (string memory);
    }
}
