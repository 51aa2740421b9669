use crate::config::{Config, Credentials};
use anyhow::{Context, Result};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

const GET_RENTABLE_CARS: &str = r#"
query GetRentableCars {
  getRentableCars {
    id
    carId
    pricePerDay
    availableQuantity
    car {
      id
      name
      type
      description
      year
      transmissionType
      fuelType
      numberOfSeats
      primaryImageUrl
      manufacturer {
        id
        name
        country
      }
    }
  }
}
"#;

const ADMIN_LOGIN: &str = r#"
mutation AdminLogin($email: String!, $password: String!) {
  adminLogin(email: $email, password: $password) {
    token
    admin {
      id
      name
      email
      role
    }
  }
}
"#;

/// Client for the car-rental backend's GraphQL endpoint.
pub struct GraphqlClient {
    client: Client,
    endpoint: String,
    token: Option<String>,
}

impl std::fmt::Debug for GraphqlClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphqlClient")
            .field("endpoint", &self.endpoint)
            .field("authenticated", &self.token.is_some())
            .finish()
    }
}

#[derive(Debug, Serialize)]
struct GraphqlRequest<'a, V> {
    query: &'a str,
    variables: V,
}

#[derive(Debug, Deserialize)]
struct GraphqlResponse<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GraphqlError>,
}

#[derive(Debug, Deserialize)]
struct GraphqlError {
    message: String,
}

#[derive(Debug, Serialize)]
struct LoginVariables<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AdminLoginData {
    admin_login: AdminSession,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AdminProfile {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AdminSession {
    pub token: String,
    pub admin: AdminProfile,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RentableCarsData {
    get_rentable_cars: Vec<Value>,
}

impl GraphqlClient {
    pub fn new(endpoint: &str) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.to_string(),
            token: None,
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Builds a client for the configured backend, logging in first when
    /// email/password credentials are configured.
    pub async fn from_config(config: &Config) -> Result<Self> {
        let client = Self::new(&config.graphql_url);
        match &config.credentials {
            Credentials::Anonymous => Ok(client),
            Credentials::Token(token) => Ok(client.with_token(token.clone())),
            Credentials::Login { email, password } => {
                let session = client
                    .admin_login(email, password)
                    .await
                    .context("Failed to log in to the backend")?;
                tracing::info!(
                    "Logged in to backend as {} ({})",
                    session.admin.email,
                    session.admin.role
                );
                Ok(client.with_token(session.token))
            }
        }
    }

    pub async fn admin_login(&self, email: &str, password: &str) -> Result<AdminSession> {
        let data: AdminLoginData = self
            .execute(ADMIN_LOGIN, LoginVariables { email, password })
            .await
            .context("adminLogin mutation failed")?;
        Ok(data.admin_login)
    }

    /// Fetches the full rentable-car snapshot with nested car and manufacturer.
    ///
    /// Rows are returned undecoded so that one malformed row fails on its own
    /// during sync instead of taking the whole snapshot down.
    pub async fn list_rentable_cars(&self) -> Result<Vec<Value>> {
        let data: RentableCarsData = self
            .execute(GET_RENTABLE_CARS, serde_json::json!({}))
            .await
            .context("getRentableCars query failed")?;
        tracing::debug!("Fetched {} rentable cars", data.get_rentable_cars.len());
        Ok(data.get_rentable_cars)
    }

    async fn execute<V, T>(&self, query: &str, variables: V) -> Result<T>
    where
        V: Serialize,
        T: DeserializeOwned,
    {
        let mut request = self
            .client
            .post(&self.endpoint)
            .json(&GraphqlRequest { query, variables });
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let resp = request
            .send()
            .await
            .context("Failed to send GraphQL request")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("GraphQL API error {}: {}", status, body);
        }

        let body: GraphqlResponse<T> = resp
            .json()
            .await
            .context("Failed to parse GraphQL response")?;

        if let Some(first) = body.errors.first() {
            anyhow::bail!(
                "GraphQL error: {} ({} error(s) total)",
                first.message,
                body.errors.len()
            );
        }

        body.data
            .ok_or_else(|| anyhow::anyhow!("GraphQL response contained no data"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};
    use rental_common::RentableCar;
    use std::time::Duration;

    const RENTABLE_CARS_BODY: &str = r#"{
        "data": {
            "getRentableCars": [
                {
                    "id": "A",
                    "carId": "c1",
                    "pricePerDay": 50,
                    "availableQuantity": 2,
                    "car": {
                        "id": "c1",
                        "name": "Civic",
                        "type": "Sedan",
                        "description": "Compact",
                        "year": "2021",
                        "transmissionType": "Manual",
                        "fuelType": "Petrol",
                        "numberOfSeats": "5",
                        "primaryImageUrl": "https://img/civic.png",
                        "manufacturer": { "id": "m1", "name": "Honda", "country": "Japan" }
                    }
                }
            ]
        }
    }"#;

    #[tokio::test]
    async fn test_list_rentable_cars_sends_bearer_token() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/graphql")
            .match_header("authorization", "Bearer tok123")
            .match_body(Matcher::Regex("getRentableCars".to_string()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(RENTABLE_CARS_BODY)
            .create_async()
            .await;

        let client =
            GraphqlClient::new(&format!("{}/graphql", server.url())).with_token("tok123");
        let cars = client.list_rentable_cars().await.unwrap();

        assert_eq!(cars.len(), 1);
        let car: RentableCar = serde_json::from_value(cars[0].clone()).unwrap();
        assert_eq!(car.id, "A");
        assert_eq!(car.price_per_day, 50.0);
        assert_eq!(car.car.year, "2021");
        assert_eq!(car.car.number_of_seats, "5");
        assert_eq!(car.car.manufacturer.name, "Honda");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_malformed_row_does_not_fail_the_fetch() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/graphql")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"data":{"getRentableCars":[{"id":"X","carId":"gone","pricePerDay":40,"availableQuantity":1,"car":null}]}}"#,
            )
            .create_async()
            .await;

        let client = GraphqlClient::new(&format!("{}/graphql", server.url()));
        let rows = client.list_rentable_cars().await.unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["id"], "X");
        assert!(rows[0]["car"].is_null());
    }

    #[tokio::test]
    async fn test_graphql_errors_are_surfaced() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/graphql")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"data":null,"errors":[{"message":"Not authorized"}]}"#)
            .create_async()
            .await;

        let client = GraphqlClient::new(&format!("{}/graphql", server.url()));
        let err = client.list_rentable_cars().await.unwrap_err();
        assert!(format!("{:#}", err).contains("Not authorized"));
    }

    #[tokio::test]
    async fn test_http_error_status() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/graphql")
            .with_status(502)
            .with_body("bad gateway")
            .create_async()
            .await;

        let client = GraphqlClient::new(&format!("{}/graphql", server.url()));
        let err = client.list_rentable_cars().await.unwrap_err();
        assert!(format!("{:#}", err).contains("502"));
    }

    #[tokio::test]
    async fn test_admin_login_returns_session() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/graphql")
            .match_body(Matcher::PartialJsonString(
                r#"{"variables":{"email":"admin@example.com","password":"pw"}}"#.to_string(),
            ))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"data":{"adminLogin":{"token":"jwt-token","admin":{"id":"1","name":"Root","email":"admin@example.com","role":"superadmin"}}}}"#,
            )
            .create_async()
            .await;

        let client = GraphqlClient::new(&format!("{}/graphql", server.url()));
        let session = client.admin_login("admin@example.com", "pw").await.unwrap();

        assert_eq!(session.token, "jwt-token");
        assert_eq!(session.admin.role, "superadmin");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_from_config_logs_in_and_uses_token() {
        let mut server = Server::new_async().await;
        let login = server
            .mock("POST", "/graphql")
            .match_body(Matcher::Regex("adminLogin".to_string()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"data":{"adminLogin":{"token":"fresh","admin":{"id":"1","name":"Root","email":"a@b.c","role":"admin"}}}}"#,
            )
            .create_async()
            .await;
        let list = server
            .mock("POST", "/graphql")
            .match_header("authorization", "Bearer fresh")
            .match_body(Matcher::Regex("getRentableCars".to_string()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"data":{"getRentableCars":[]}}"#)
            .create_async()
            .await;

        let config = Config {
            graphql_url: format!("{}/graphql", server.url()),
            credentials: Credentials::Login {
                email: "a@b.c".to_string(),
                password: "pw".to_string(),
            },
            backend: crate::config::IndexBackend::Memory,
            typesense: None,
            sync_strategy: crate::sync_service::SyncStrategy::Sequential,
            sync_prune: true,
            sync_interval: Duration::from_secs(30),
            port: 8080,
        };

        let client = GraphqlClient::from_config(&config).await.unwrap();
        assert!(client.list_rentable_cars().await.unwrap().is_empty());

        login.assert_async().await;
        list.assert_async().await;
    }
}
