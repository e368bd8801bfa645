//! Protobuf contract of the Roster user service.

pub mod user {
    pub mod v1 {
        tonic::include_proto!("user.v1");
    }
}

pub mod v1 {
    pub use crate::user::v1::*;
}
