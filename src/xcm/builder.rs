//! Transfer builder backed by the XCM API and live endpoint sessions

use super::api::{interpret_dry_run, Currency, TransferOptions, XTransferRequest, XcmApiClient};
use crate::chain::EndpointConnection;
use crate::error::TransferResult;
use crate::quote::{resolve_asset, AssetRegistry};
use crate::transfer::{
    units, AttemptContext, DryRunReport, PreparedTransfer, RouteDescriptor, SignablePayload,
    TransferBuilder,
};

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

pub struct XcmApiBuilder {
    api: Arc<XcmApiClient>,
    registry: Arc<dyn AssetRegistry>,
    connect_timeout: Duration,
}

impl XcmApiBuilder {
    pub fn new(
        api: Arc<XcmApiClient>,
        registry: Arc<dyn AssetRegistry>,
        connect_timeout: Duration,
    ) -> Self {
        Self {
            api,
            registry,
            connect_timeout,
        }
    }

    /// Amount as the API expects it: untouched when the service scales it,
    /// otherwise in minor units of the asset on the source chain
    async fn transfer_amount(&self, route: &RouteDescriptor) -> TransferResult<String> {
        if route.abstract_decimals {
            return Ok(route.amount.to_string());
        }

        let asset =
            resolve_asset(self.registry.as_ref(), route.source_chain, &route.asset_symbol).await?;
        let minor = units::to_minor_units(route.amount.as_str(), asset.decimals)?;
        debug!(
            "Scaled {} {} to {} minor units ({} decimals)",
            route.amount, route.asset_symbol, minor, asset.decimals
        );
        Ok(minor.to_string())
    }

    fn request(ctx: &AttemptContext, amount: String) -> XTransferRequest {
        let route = &ctx.route;
        let mut api_overrides = HashMap::new();
        api_overrides.insert(route.source_chain, ctx.endpoints.source.clone());
        api_overrides.insert(route.destination_chain, ctx.endpoints.destination.clone());

        XTransferRequest {
            from: route.source_chain,
            to: route.destination_chain,
            currency: Currency {
                symbol: route.asset_symbol.clone(),
                amount,
            },
            address: route.destination_address.clone(),
            sender_address: route.source_address.clone(),
            options: TransferOptions {
                abstract_decimals: route.abstract_decimals,
                api_overrides,
            },
        }
    }
}

#[async_trait]
impl TransferBuilder for XcmApiBuilder {
    async fn prepare(&self, ctx: &AttemptContext) -> TransferResult<Box<dyn PreparedTransfer>> {
        let amount = self.transfer_amount(&ctx.route).await?;

        let source = EndpointConnection::connect(
            ctx.route.source_chain,
            &ctx.endpoints.source,
            self.connect_timeout,
        )
        .await?;

        let destination = match EndpointConnection::connect(
            ctx.route.destination_chain,
            &ctx.endpoints.destination,
            self.connect_timeout,
        )
        .await
        {
            Ok(connection) => connection,
            Err(e) => {
                source.disconnect();
                return Err(e);
            }
        };

        Ok(Box::new(XcmPreparedTransfer {
            api: self.api.clone(),
            request: Self::request(ctx, amount),
            source,
            destination,
        }))
    }
}

/// Transfer bound to one open source/destination session pair
pub struct XcmPreparedTransfer {
    api: Arc<XcmApiClient>,
    request: XTransferRequest,
    source: EndpointConnection,
    destination: EndpointConnection,
}

#[async_trait]
impl PreparedTransfer for XcmPreparedTransfer {
    async fn dry_run(&self) -> TransferResult<Option<DryRunReport>> {
        let response = self.api.dry_run(&self.request).await?;
        interpret_dry_run(response).map(Some)
    }

    async fn build_payload(&self) -> TransferResult<SignablePayload> {
        let call_data = self.api.transfer_call(&self.request).await?;
        debug!(
            "Built call on {} against {} ({} finalized at {}), destination {} finalized at {}",
            self.source.chain(),
            self.source.url(),
            self.source.reported_chain(),
            self.source.finalized_head(),
            self.destination.reported_chain(),
            self.destination.finalized_head()
        );

        Ok(SignablePayload {
            chain: self.source.chain(),
            endpoint: self.source.url().to_string(),
            sender: self.request.sender_address.clone(),
            call_data,
        })
    }

    async fn disconnect(self: Box<Self>) -> TransferResult<()> {
        let XcmPreparedTransfer {
            source,
            destination,
            ..
        } = *self;
        source.disconnect();
        destination.disconnect();
        Ok(())
    }
}
