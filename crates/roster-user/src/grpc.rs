use crate::error::UserError;
use crate::service::EntityService;
use roster_core::Storer;
use roster_proto_schema::v1::user_service_server::UserService;
use roster_proto_schema::v1::{
    AddEntityRequest, AddEntityResponse, GetEntitiesRequest, GetEntitiesResponse,
};
use tonic::{Request, Response, Status};
use tracing::warn;

/// gRPC adapter exposing an [`EntityService`] as `user.v1.UserService`.
pub struct UserGrpcServer<S> {
    service: EntityService<S>,
}

impl<S: Storer> UserGrpcServer<S> {
    pub fn new(service: EntityService<S>) -> Self {
        Self { service }
    }
}

fn into_status(operation: &str, error: UserError) -> Status {
    warn!(operation, error = %error, "request failed");
    Status::from(error)
}

#[tonic::async_trait]
impl<S: Storer> UserService for UserGrpcServer<S> {
    async fn add_entity(
        &self,
        request: Request<AddEntityRequest>,
    ) -> Result<Response<AddEntityResponse>, Status> {
        let AddEntityRequest { user_id, entity_id } = request.into_inner();

        self.service
            .add_entity(&user_id, &entity_id)
            .await
            .map_err(|e| into_status("add entity", e))?;

        Ok(Response::new(AddEntityResponse {}))
    }

    async fn get_entities(
        &self,
        request: Request<GetEntitiesRequest>,
    ) -> Result<Response<GetEntitiesResponse>, Status> {
        let GetEntitiesRequest { user_id } = request.into_inner();

        let entity_ids = self
            .service
            .get_entities(&user_id)
            .await
            .map_err(|e| into_status("get entities", e))?;

        Ok(Response::new(GetEntitiesResponse { entity_ids }))
    }
}
