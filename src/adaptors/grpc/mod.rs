//! gRPC transparent proxy (spec §4.5.5). Explicit Cosmos service
//! registrations take precedence over the generic director because the
//! server routes by service name — both paths share the same pooled
//! channel cache and registry.

pub mod codec;
pub mod director;
pub mod pb;
pub mod services;

use crate::server::GatewayState;
use http::Request;
use hyper::body::Incoming;
use pb::cmtservice::service_server::ServiceServer as CmtServiceServer;
use pb::txservice::service_server::ServiceServer as TxServiceServer;
use services::{CmtServiceImpl, TxServiceImpl};
use tonic::body::BoxBody;
use tower::Service;

const CMT_SERVICE_PREFIX: &str = "/cosmos.base.tendermint.v1beta1.Service/";
const TX_SERVICE_PREFIX: &str = "/cosmos.tx.v1beta1.Service/";

#[derive(Clone)]
pub struct GrpcRouter {
    cmt: CmtServiceServer<CmtServiceImpl>,
    tx: TxServiceServer<TxServiceImpl>,
    state: GatewayState,
}

impl GrpcRouter {
    pub fn new(state: GatewayState) -> Self {
        Self {
            cmt: CmtServiceImpl::new(state.registry.clone(), state.pool.clone()).into_server(),
            tx: TxServiceImpl::new(state.registry.clone(), state.pool.clone()).into_server(),
            state,
        }
    }

    pub async fn handle(&self, req: Request<Incoming>) -> http::Response<BoxBody> {
        let path = req.uri().path();

        if path.starts_with(CMT_SERVICE_PREFIX) {
            return self.cmt.clone().call(req).await.unwrap();
        }
        if path.starts_with(TX_SERVICE_PREFIX) {
            return self.tx.clone().call(req).await.unwrap();
        }

        director::route(
            req,
            self.state.registry.clone(),
            self.state.accounting.clone(),
            self.state.pool.clone(),
        )
        .await
    }
}
