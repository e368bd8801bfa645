use roster_proto_schema::v1::user_service_client::UserServiceClient;
use roster_proto_schema::v1::{AddEntityRequest, GetEntitiesRequest};
use roster_user::server::serve;
use roster_user::ServiceConfig;
use std::net::{SocketAddr, TcpListener};
use std::time::Duration;
use tokio::sync::oneshot;
use tonic::transport::Channel;
use tonic::Code;
use tonic_health::pb::health_check_response::ServingStatus;
use tonic_health::pb::health_client::HealthClient;
use tonic_health::pb::HealthCheckRequest;

fn free_local_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap()
}

async fn connect_with_retry(addr: SocketAddr) -> Channel {
    let endpoint = format!("http://{addr}");
    for _ in 0..50 {
        if let Ok(channel) = Channel::from_shared(endpoint.clone()).unwrap().connect().await {
            return channel;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    panic!("server at {addr} never came up");
}

#[tokio::test]
async fn serves_user_and_health_services() {
    let addr = free_local_addr();
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let config = ServiceConfig::builder().listen_addr(addr).build();

    let server = tokio::spawn(serve(config, async {
        let _ = shutdown_rx.await;
    }));

    let channel = connect_with_retry(addr).await;
    let mut client = UserServiceClient::new(channel.clone());

    client
        .add_entity(AddEntityRequest {
            user_id: "User-0".to_string(),
            entity_id: "Entity-0".to_string(),
        })
        .await
        .unwrap();

    let status = client
        .add_entity(AddEntityRequest {
            user_id: "User-0".to_string(),
            entity_id: "Entity-0".to_string(),
        })
        .await
        .unwrap_err();
    assert_eq!(status.code(), Code::AlreadyExists);

    client
        .add_entity(AddEntityRequest {
            user_id: "User-0".to_string(),
            entity_id: "Entity-1".to_string(),
        })
        .await
        .unwrap();

    let response = client
        .get_entities(GetEntitiesRequest {
            user_id: "User-0".to_string(),
        })
        .await
        .unwrap();
    assert_eq!(
        response.into_inner().entity_ids,
        vec!["Entity-0", "Entity-1"]
    );

    let status = client
        .get_entities(GetEntitiesRequest {
            user_id: String::new(),
        })
        .await
        .unwrap_err();
    assert_eq!(status.code(), Code::InvalidArgument);

    let mut health = HealthClient::new(channel);
    let response = health
        .check(HealthCheckRequest {
            service: "user.v1.UserService".to_string(),
        })
        .await
        .unwrap();
    assert_eq!(response.into_inner().status, ServingStatus::Serving as i32);

    shutdown_tx.send(()).unwrap();
    server.await.unwrap().unwrap();
}
