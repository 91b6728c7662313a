//! Integration tests for the OpenStack client
//!
//! These tests require a reachable OpenStack cloud.
//! Set OS_AUTH_URL, OS_USERNAME, OS_PASSWORD and OS_TENANT_NAME to run.

use openstack_client::{AuthOptions, Cloud, CloudConnector, DEFAULT_REGION};

fn auth_options() -> AuthOptions {
    let env = |name: &str| std::env::var(name).ok().filter(|v| !v.is_empty());
    AuthOptions {
        auth_url: env("OS_AUTH_URL").expect("OS_AUTH_URL environment variable must be set"),
        user_id: env("OS_USER_ID"),
        username: env("OS_USERNAME"),
        password: env("OS_PASSWORD").expect("OS_PASSWORD environment variable must be set"),
        tenant_id: env("OS_TENANT_ID"),
        tenant_name: env("OS_TENANT_NAME"),
        domain_id: env("OS_DOMAIN_ID"),
        domain_name: env("OS_DOMAIN_NAME"),
    }
}

fn region() -> String {
    std::env::var("OS_REGION_NAME").unwrap_or_else(|_| DEFAULT_REGION.to_string())
}

#[tokio::test]
#[ignore] // Requires a running OpenStack cloud
async fn test_authenticate() {
    let cloud = Cloud::connect(&auth_options()).await.expect("Failed to authenticate");
    assert!(!cloud.tenant_id().is_empty());
    assert!(!cloud.session().catalog.entries.is_empty());
}

#[tokio::test]
#[ignore]
async fn test_list_flavors_and_images() {
    let cloud = Cloud::connect(&auth_options()).await.expect("Failed to authenticate");
    let client = cloud.client_for(&region()).await.expect("Failed to build client");

    let flavors = client.list_flavors().await.expect("Failed to list flavors");
    println!("Found {} flavors", flavors.len());

    let images = client.list_images().await.expect("Failed to list images");
    println!("Found {} images", images.len());
}

#[tokio::test]
#[ignore]
async fn test_keypair_lifecycle() {
    let cloud = Cloud::connect(&auth_options()).await.expect("Failed to authenticate");
    let client = cloud.client_for(&region()).await.expect("Failed to build client");

    let name = format!("integration-{}", std::process::id());
    let public_key = "ssh-rsa AAAAB3NzaC1yc2EAAAADAQABAAABAQDxCo1Fj6mw5JCt7S0Rlv1wcfQG integration@test";

    let created = client.create_keypair(&name, public_key).await.expect("Failed to create keypair");
    assert_eq!(created.name, name);

    let fetched = client.get_keypair(&name).await.expect("Failed to get keypair");
    assert_eq!(fetched.fingerprint, created.fingerprint);

    client.delete_keypair(&name).await.expect("Failed to delete keypair");
    let err = client.get_keypair(&name).await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
#[ignore]
async fn test_missing_server_is_not_found() {
    let cloud = Cloud::connect(&auth_options()).await.expect("Failed to authenticate");
    let client = cloud.client_for(&region()).await.expect("Failed to build client");

    let err = client
        .get_server("00000000-0000-0000-0000-000000000000")
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}
