//! In-process console sign-in URL minting.
//!
//! Mirrors what `aws-vault login` does under the hood: mint temporary
//! credentials with STS `GetFederationToken`, exchange them for a sign-in
//! token at the AWS federation endpoint, and build the final console login
//! URL. Government and China partitions use their own federation hosts and
//! console domains.

use anyhow::{Context, Result, ensure};
use aws_sdk_sts::{Client, types::PolicyDescriptorType};
use aws_smithy_types::date_time::Format;
use log::info;
use serde::Deserialize;
use url::Url;

/// GetFederationToken scopes permissions to the intersection of the user's
/// policy and this one, same as aws-vault.
const FEDERATION_POLICY_ARN: &str = "arn:aws:iam::aws:policy/AdministratorAccess";
const FEDERATION_TOKEN_SECONDS: i32 = 3600;

#[derive(Deserialize)]
struct SigninTokenResponse {
    #[serde(rename = "SigninToken")]
    signin_token: String,
}

/// Builds a console sign-in URL for the given profile.
///
/// Credentials are resolved through the SDK default chain for the profile,
/// so environment variables and the shared config/credentials files behave
/// exactly as they do for the AWS CLI.
pub async fn login_url(profile: &str) -> Result<String> {
    let config = aws_config::from_env().profile_name(profile).load().await;
    let region = config
        .region()
        .map(|r| r.as_ref().to_string())
        .unwrap_or_default();

    let federation_token = Client::new(&config)
        .get_federation_token()
        .name("awslogin")
        .policy_arns(
            PolicyDescriptorType::builder()
                .arn(FEDERATION_POLICY_ARN)
                .build(),
        )
        .duration_seconds(FEDERATION_TOKEN_SECONDS)
        .send()
        .await
        .with_context(|| format!("GetFederationToken failed for profile {profile:?}"))?;
    let credentials = federation_token
        .credentials()
        .context("No credentials returned")?;
    info!(
        "Created federation token, expires at {}",
        credentials.expiration().fmt(Format::DateTime)?
    );

    let session = serde_json::json!({
        "sessionId": credentials.access_key_id(),
        "sessionKey": credentials.secret_access_key(),
        "sessionToken": credentials.session_token(),
    })
    .to_string();

    let (endpoint, destination) = endpoints(&region);
    let response = reqwest::Client::new()
        .get(endpoint)
        .query(&[("Action", "getSigninToken"), ("Session", session.as_str())])
        .send()
        .await
        .context("Call to getSigninToken failed")?;
    let status = response.status();
    let body = response.text().await?;
    ensure!(status.is_success(), "Call to getSigninToken failed with {status}: {body}");
    let token: SigninTokenResponse =
        serde_json::from_str(&body).context("Expected a response with SigninToken")?;

    build_login_url(endpoint, &destination, &token.signin_token)
}

/// The federation endpoint and console destination for a region. The `cn-`
/// and `us-gov-` partitions have their own hosts; an empty region falls back
/// to the default console home.
fn endpoints(region: &str) -> (&'static str, String) {
    if region.is_empty() {
        return (
            "https://signin.aws.amazon.com/federation",
            "https://console.aws.amazon.com/".to_string(),
        );
    }
    let (endpoint, domain) = if region.starts_with("cn-") {
        ("https://signin.amazonaws.cn/federation", "console.amazonaws.cn")
    } else if region.starts_with("us-gov-") {
        (
            "https://signin.amazonaws-us-gov.com/federation",
            "console.amazonaws-us-gov.com",
        )
    } else {
        ("https://signin.aws.amazon.com/federation", "console.aws.amazon.com")
    };
    (
        endpoint,
        format!("https://{region}.{domain}/console/home?region={region}"),
    )
}

fn build_login_url(endpoint: &str, destination: &str, signin_token: &str) -> Result<String> {
    let mut url = Url::parse(endpoint).context("Invalid federation endpoint")?;
    url.query_pairs_mut()
        .append_pair("Action", "login")
        .append_pair("Issuer", "awslogin")
        .append_pair("Destination", destination)
        .append_pair("SigninToken", signin_token);
    Ok(url.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_region_uses_the_default_console() {
        let (endpoint, destination) = endpoints("");
        assert_eq!(endpoint, "https://signin.aws.amazon.com/federation");
        assert_eq!(destination, "https://console.aws.amazon.com/");
    }

    #[test]
    fn commercial_region_lands_on_its_regional_console() {
        let (endpoint, destination) = endpoints("eu-west-1");
        assert_eq!(endpoint, "https://signin.aws.amazon.com/federation");
        assert_eq!(
            destination,
            "https://eu-west-1.console.aws.amazon.com/console/home?region=eu-west-1"
        );
    }

    #[test]
    fn china_partition_swaps_both_hosts() {
        let (endpoint, destination) = endpoints("cn-north-1");
        assert_eq!(endpoint, "https://signin.amazonaws.cn/federation");
        assert_eq!(
            destination,
            "https://cn-north-1.console.amazonaws.cn/console/home?region=cn-north-1"
        );
    }

    #[test]
    fn govcloud_partition_swaps_both_hosts() {
        let (endpoint, destination) = endpoints("us-gov-west-1");
        assert_eq!(endpoint, "https://signin.amazonaws-us-gov.com/federation");
        assert_eq!(
            destination,
            "https://us-gov-west-1.console.amazonaws-us-gov.com/console/home?region=us-gov-west-1"
        );
    }

    #[test]
    fn login_url_escapes_the_destination_and_token() {
        let url = build_login_url(
            "https://signin.aws.amazon.com/federation",
            "https://console.aws.amazon.com/",
            "tok/en+value",
        )
        .unwrap();
        assert!(url.starts_with("https://signin.aws.amazon.com/federation?Action=login"));
        assert!(url.contains("Issuer=awslogin"));
        assert!(url.contains("Destination=https%3A%2F%2Fconsole.aws.amazon.com%2F"));
        assert!(url.contains("SigninToken=tok%2Fen%2Bvalue"));
    }
}
