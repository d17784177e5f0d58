//! Per-contract entry points over the built-in schemas.
//!
//! ```ignore
//! let decimals = bindings::erc20::read(token, transport.clone(), "decimals", &[]).await?;
//! let watch = bindings::cartesi_input_box::watch_event(
//!     input_box,
//!     transport,
//!     EventFilter::new("InputAdded").with("dapp", dapp),
//!     |event| log::info!("{event:?}"),
//! )
//! .await?;
//! ```

macro_rules! contract_bindings {
    (@operations $schema:path) => {
        use std::sync::Arc;

        use alloy::primitives::{Address, U256};

        use crate::contract::{ContractHandle, Error};
        use crate::pending::{PendingTransaction, PreparedWrite};
        use crate::transport::Transport;
        use crate::value::AbiValue;

        /// Binds the schema to `address`.
        pub fn get(address: Address, transport: Arc<dyn Transport>) -> ContractHandle {
            ContractHandle::new($schema(), address, transport)
        }

        /// See [`ContractHandle::read`].
        pub async fn read(
            address: Address,
            transport: Arc<dyn Transport>,
            function: &str,
            args: &[AbiValue],
        ) -> Result<Vec<AbiValue>, Error> {
            let handle = get(address, transport);
            handle.read(function, args).await
        }

        /// See [`ContractHandle::write`].
        pub async fn write(
            address: Address,
            transport: Arc<dyn Transport>,
            function: &str,
            args: &[AbiValue],
            value: Option<U256>,
        ) -> Result<PendingTransaction, Error> {
            let handle = get(address, transport);
            handle.write(function, args, value).await
        }

        /// See [`ContractHandle::prepare_write`].
        pub async fn prepare_write(
            address: Address,
            transport: Arc<dyn Transport>,
            function: &str,
            args: Vec<AbiValue>,
            value: Option<U256>,
            simulate: bool,
        ) -> Result<PreparedWrite, Error> {
            let handle = get(address, transport);
            handle
                .prepare_write()
                .function(function)
                .args(args)
                .maybe_value(value)
                .simulate(simulate)
                .call()
                .await
        }
    };

    ($(#[$doc:meta])* $module:ident => $schema:path, with events) => {
        $(#[$doc])*
        pub mod $module {
            contract_bindings!(@operations $schema);

            use crate::events::{DecodedEvent, EventFilter, WatchHandle};

            /// See [`ContractHandle::watch_event`].
            pub async fn watch_event<F>(
                address: Address,
                transport: Arc<dyn Transport>,
                filter: EventFilter,
                callback: F,
            ) -> Result<WatchHandle, Error>
            where
                F: FnMut(DecodedEvent) + Send + 'static,
            {
                let handle = get(address, transport);
                handle.watch_event(filter, callback).await
            }
        }
    };

    ($(#[$doc:meta])* $module:ident => $schema:path) => {
        $(#[$doc])*
        pub mod $module {
            contract_bindings!(@operations $schema);
        }
    };
}

contract_bindings!(
    /// ERC20 token.
    erc20 => crate::contracts::erc20, with events
);

contract_bindings!(
    /// ERC721 token.
    erc721 => crate::contracts::erc721, with events
);

contract_bindings!(
    /// Rollups application contract.
    cartesi_dapp => crate::contracts::cartesi_dapp, with events
);

contract_bindings!(
    /// Rollups input box.
    cartesi_input_box => crate::contracts::cartesi_input_box, with events
);

contract_bindings!(
    /// ERC20 deposit portal. It declares no events.
    cartesi_erc20_portal => crate::contracts::cartesi_erc20_portal
);
