use std::sync::Arc;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;

use crate::token::{Token, TokenCache};
use crate::types::{CloudDirectoryUser, ClusterSnapshot, CreateClusterResult, IamUser, Location, Vlan, VlanType};
use crate::{CloudProvider, ProviderError, ProviderResult};

/// Configuration for the concrete cloud provider client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_endpoint: String,
    pub iam_endpoint: String,
    pub api_key: String,
    pub account_id: String,
    pub tenant_id: String,
}

struct Inner {
    http: reqwest::Client,
    config: ClientConfig,
    tokens: TokenCache,
}

/// `reqwest`-backed `CloudProvider`. Cheap to clone: all state lives behind
/// an `Arc`.
#[derive(Clone)]
pub struct Client {
    inner: Arc<Inner>,
}

#[derive(Deserialize)]
struct DatacenterDto {
    id: String,
    #[serde(rename = "displayName")]
    display_name: String,
    kind: String,
}

#[derive(Deserialize)]
struct VlanDto {
    id: String,
    #[serde(rename = "type")]
    vlan_type: String,
}

#[derive(Deserialize)]
struct TokenResponseDto {
    access_token: String,
    expires_in: i64,
}

impl Client {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                http: reqwest::Client::new(),
                config,
                tokens: TokenCache::new(),
            }),
        }
    }

    async fn token(&self) -> ProviderResult<String> {
        let now = now_unix();
        let inner = self.inner.clone();
        inner.tokens.get(now, || self.obtain_new_token()).await
    }

    async fn obtain_new_token(&self) -> ProviderResult<Token> {
        let resp = self
            .inner
            .http
            .post(format!("{}/identity/token", self.inner.config.iam_endpoint))
            .form(&[
                ("grant_type", "urn:ibm:params:oauth:grant-type:apikey"),
                ("apikey", self.inner.config.api_key.as_str()),
                ("response_type", "cloud_iam"),
            ])
            .send()
            .await?
            .error_for_status()?;
        let body: TokenResponseDto = resp.json().await?;
        Ok(Token {
            access_token: body.access_token,
            expires_at_unix: now_unix() + body.expires_in,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.inner.config.api_endpoint, path)
    }
}

fn now_unix() -> i64 {
    chrono::Utc::now().timestamp()
}

#[async_trait]
impl CloudProvider for Client {
    async fn get_zones(&self) -> ProviderResult<Vec<Location>> {
        let token = self.token().await?;
        let resp = self
            .inner
            .http
            .get(self.url("/v2/datacenters"))
            .bearer_auth(token)
            .send()
            .await?
            .error_for_status()?;
        let dcs: Vec<DatacenterDto> = resp.json().await?;
        let mut zones: Vec<Location> = dcs
            .into_iter()
            .filter(|dc| dc.kind == "dc")
            .map(|dc| Location {
                id: dc.id,
                display_name: dc.display_name,
                kind: dc.kind,
            })
            .collect();
        zones.sort_by(|a, b| a.display_name.cmp(&b.display_name));
        Ok(zones)
    }

    async fn get_vlans(&self, zone: &str) -> ProviderResult<Vec<Vlan>> {
        let token = self.token().await?;
        let resp = self
            .inner
            .http
            .get(self.url(&format!("/v2/vlans?datacenter={zone}")))
            .bearer_auth(token)
            .send()
            .await?
            .error_for_status()?;
        let dtos: Vec<VlanDto> = resp.json().await?;
        Ok(dtos
            .into_iter()
            .filter_map(|v| {
                let vlan_type = match v.vlan_type.as_str() {
                    "public" => VlanType::Public,
                    "private" => VlanType::Private,
                    _ => return None,
                };
                Some(Vlan { id: v.id, vlan_type })
            })
            .collect())
    }

    async fn create_cluster(
        &self,
        name: &str,
        zone: &str,
        no_subnet: bool,
    ) -> ProviderResult<CreateClusterResult> {
        let existing = self.get_vlans(zone).await?;
        let had_public = existing.iter().any(|v| v.vlan_type == VlanType::Public);
        let had_private = existing.iter().any(|v| v.vlan_type == VlanType::Private);

        let token = self.token().await?;
        let body = json!({
            "name": name,
            "datacenter": zone,
            "noSubnet": no_subnet,
        });
        let resp = self
            .inner
            .http
            .post(self.url("/v2/clusters"))
            .bearer_auth(&token)
            .json(&body)
            .send()
            .await?
            .error_for_status()?;

        #[derive(Deserialize)]
        struct CreateResponseDto {
            id: String,
            #[serde(rename = "requestId")]
            request_id: String,
        }
        let created: CreateResponseDto = resp.json().await?;

        // The provider auto-creates a vlan type that was absent; re-query
        // so the caller records which ids materialized.
        let vlans = if !had_public || !had_private {
            self.get_vlans(zone).await?
        } else {
            existing
        };
        let public_vlan = vlans
            .iter()
            .find(|v| v.vlan_type == VlanType::Public)
            .map(|v| v.id.clone())
            .unwrap_or_default();
        let private_vlan = vlans
            .iter()
            .find(|v| v.vlan_type == VlanType::Private)
            .map(|v| v.id.clone())
            .unwrap_or_default();

        Ok(CreateClusterResult {
            cluster_id: created.id,
            provider_request_id: created.request_id,
            public_vlan,
            private_vlan,
        })
    }

    async fn get_cluster(&self, id: &str) -> ProviderResult<ClusterSnapshot> {
        let token = self.token().await?;
        let resp = self
            .inner
            .http
            .get(self.url(&format!("/v2/clusters/{id}")))
            .bearer_auth(token)
            .send()
            .await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Err(ProviderError::NotFound);
        }
        let resp = resp.error_for_status()?;

        #[derive(Deserialize)]
        struct ClusterDto {
            id: String,
            state: String,
            #[serde(default)]
            #[serde(rename = "masterURL")]
            master_url: String,
            #[serde(default)]
            #[serde(rename = "ingressHostname")]
            hostname: String,
        }
        let dto: ClusterDto = resp.json().await?;
        Ok(ClusterSnapshot {
            id: dto.id,
            state: dto.state,
            hostname: dto.hostname,
            master_url: dto.master_url,
        })
    }

    async fn delete_cluster(&self, id: &str) -> ProviderResult<()> {
        let token = self.token().await?;
        let resp = self
            .inner
            .http
            .delete(self.url(&format!("/v2/clusters/{id}")))
            .bearer_auth(token)
            .send()
            .await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Err(ProviderError::NotFound);
        }
        resp.error_for_status()?;
        Ok(())
    }

    async fn create_cloud_directory_user(&self, username: &str) -> ProviderResult<CloudDirectoryUser> {
        let token = self.token().await?;
        let email = format!("{username}@devcluster.example.com");
        let password = generate_password(16);
        let body = json!({
            "username": username,
            "email": email,
            "password": password,
        });
        let resp = self
            .inner
            .http
            .post(self.url(&format!("/appid/v1/{}/sign_up", self.inner.config.tenant_id)))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await?
            .error_for_status()?;

        #[derive(Deserialize)]
        struct SignUpDto {
            id: String,
        }
        let dto: SignUpDto = resp.json().await?;
        Ok(CloudDirectoryUser {
            id: dto.id,
            username: username.to_string(),
            email,
            password,
        })
    }

    async fn update_cloud_directory_user_password(&self, id: &str) -> ProviderResult<CloudDirectoryUser> {
        let token = self.token().await?;
        let password = generate_password(16);
        let body = json!({ "password": password });
        let resp = self
            .inner
            .http
            .put(self.url(&format!(
                "/appid/v1/{}/users/{id}/password",
                self.inner.config.tenant_id
            )))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Err(ProviderError::NotFound);
        }
        let resp = resp.error_for_status()?;

        #[derive(Deserialize)]
        struct UserDto {
            id: String,
            username: String,
            email: String,
        }
        let dto: UserDto = resp.json().await?;
        Ok(CloudDirectoryUser {
            id: dto.id,
            username: dto.username,
            email: dto.email,
            password,
        })
    }

    async fn get_iam_user_by_user_id(&self, user_id: &str) -> ProviderResult<IamUser> {
        let token = self.token().await?;
        let resp = self
            .inner
            .http
            .get(self.url(&format!(
                "/v1/users?account_id={}&user_id={user_id}",
                self.inner.config.account_id
            )))
            .bearer_auth(token)
            .send()
            .await?
            .error_for_status()?;

        #[derive(Deserialize)]
        struct IamUserDto {
            iam_id: String,
        }
        let results: Vec<IamUserDto> = resp.json().await?;
        match results.len() {
            0 => Err(ProviderError::NotFound),
            1 => Ok(IamUser {
                id: results.into_iter().next().unwrap().iam_id,
            }),
            n => Err(ProviderError::Other(format!(
                "expected exactly one IAM user for {user_id}, found {n}"
            ))),
        }
    }

    async fn create_access_policy(
        &self,
        account_id: &str,
        iam_user_id: &str,
        cluster_id: &str,
    ) -> ProviderResult<String> {
        let token = self.token().await?;
        let body = json!({
            "subjects": [{ "attributes": [{ "name": "iam_id", "value": iam_user_id }] }],
            "roles": [{ "role_id": "crn:v1:bluemix:public:iam::::role:Viewer" }],
            "resources": [{
                "attributes": [
                    { "name": "accountId", "value": account_id },
                    { "name": "clusterId", "value": cluster_id },
                ],
            }],
        });
        let resp = self
            .inner
            .http
            .post(self.url("/v1/policies"))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await?
            .error_for_status()?;

        #[derive(Deserialize)]
        struct PolicyDto {
            id: String,
        }
        let dto: PolicyDto = resp.json().await?;
        Ok(dto.id)
    }

    async fn delete_access_policy(&self, policy_id: &str) -> ProviderResult<()> {
        let token = self.token().await?;
        let resp = self
            .inner
            .http
            .delete(self.url(&format!("/v1/policies/{policy_id}")))
            .bearer_auth(token)
            .send()
            .await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Err(ProviderError::NotFound);
        }
        resp.error_for_status()?;
        Ok(())
    }
}

fn generate_password(n: usize) -> String {
    use rand::Rng;
    const CHARS: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz23456789!@#$%";
    let mut rng = rand::rng();
    (0..n)
        .map(|_| CHARS[rng.random_range(0..CHARS.len())] as char)
        .collect()
}
