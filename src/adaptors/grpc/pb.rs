//! Generated Cosmos SDK service stubs (spec §4.5.5's "explicit service
//! registrations"). Built from `proto/cmtservice.proto` and
//! `proto/txservice.proto` by `build.rs`.

pub mod cmtservice {
    tonic::include_proto!("cosmos.base.tendermint.v1beta1");
}

pub mod txservice {
    tonic::include_proto!("cosmos.tx.v1beta1");
}
