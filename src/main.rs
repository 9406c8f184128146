use std::{env, io, io::Write, process::ExitCode};
use testdroid_api::{ApiClient, ApiEntity, ApiError, ApiUser};
use tracing_subscriber::EnvFilter;

/// Used when `TESTDROID_URL` is unset.
const DEFAULT_CLOUD_URL: &str = "https://cloud.testdroid.com";

/// Where to connect, and as whom.
struct Config {
    cloud_url: String,
    username: String,
    password: String,
}

impl Config {
    /// Reads configuration from the environment, asking for anything missing.
    fn load() -> io::Result<Self> {
        let cloud_url = env::var("TESTDROID_URL").unwrap_or_else(|_| DEFAULT_CLOUD_URL.to_string());
        let username = match env::var("TESTDROID_USERNAME") {
            Ok(username) => username,
            Err(_) => interactive_prompt("your username")?,
        };
        let password = match env::var("TESTDROID_PASSWORD") {
            Ok(password) => password,
            Err(_) => interactive_prompt("your password")?,
        };

        Ok(Self {
            cloud_url,
            username,
            password,
        })
    }
}

/// Quick and dirty function to read input from the user.
fn interactive_prompt(prompt_type: &str) -> io::Result<String> {
    let mut response = String::new();
    print!("Please enter {prompt_type} for your Testdroid account: ");
    io::stdout().flush()?;
    io::stdin().read_line(&mut response)?;

    // Remove newline
    Ok(response.trim_end_matches(['\r', '\n']).to_string())
}

/// Any resource will do when all we want is its self-URI and id.
#[derive(serde::Deserialize)]
struct AnyResource {
    id: Option<String>,
}

impl ApiEntity for AnyResource {
    fn id(&self) -> Option<String> {
        self.id.clone()
    }
}

async fn run(client: &ApiClient, path: Option<String>) -> Result<(), ApiError> {
    // Fail on bad credentials here rather than as a 401 further down.
    client.authenticate().await?;

    match path {
        Some(path) => {
            let resource = client.get::<AnyResource>(&path).await?;
            println!("{}: id {}", resource.self_uri(), resource.id().unwrap_or_default());
        }
        None => {
            let me = client.me().await?;
            print_user(&me);
        }
    }
    Ok(())
}

fn print_user(user: &ApiUser) {
    println!("id:           {}", user.id.map(|id| id.to_string()).unwrap_or_default());
    println!("email:        {}", user.email.as_deref().unwrap_or_default());
    println!("name:         {}", user.name.as_deref().unwrap_or_default());
    println!("organization: {}", user.organization.as_deref().unwrap_or_default());
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .init();

    let config = match Config::load() {
        Ok(config) => config,
        Err(error) => {
            tracing::error!(%error, "unable to read configuration");
            return ExitCode::FAILURE;
        }
    };

    let client = match ApiClient::new(&config.cloud_url, config.username, config.password) {
        Ok(client) => client,
        Err(error) => {
            tracing::error!(%error, "unable to create API client");
            return ExitCode::FAILURE;
        }
    };

    match run(&client, env::args().nth(1)).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            tracing::error!(%error, status = ?error.status(), "API call failed");
            ExitCode::FAILURE
        }
    }
}
