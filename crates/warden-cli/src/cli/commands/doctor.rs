use crate::cli::args::DoctorArgs;
use crate::exit_codes::{CONFIG_ERROR, SUCCESS};
use warden_gateway::{Gateway, GatewayConfig};

pub async fn run(_args: DoctorArgs) -> anyhow::Result<i32> {
    let config = match GatewayConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("config: {e}");
            return Ok(CONFIG_ERROR);
        }
    };

    println!("database:  {}", config.db_path.display());
    println!("catalog:   {}", config.catalog_path.display());
    println!("tenant:    {}", config.tenant_id);
    println!("auth mode: {:?}", config.auth.mode);
    match &config.auth.jwks_uri {
        Some(uri) => println!("jwks:      {uri}"),
        None => println!("jwks:      not configured, user JWTs will be rejected"),
    }

    match Gateway::open(&config) {
        Ok(gateway) => {
            println!(
                "ok: {} apps, {} policies, {} api keys",
                gateway.catalog.apps.len(),
                gateway.catalog.policies.len(),
                gateway.catalog.api_keys.len()
            );
            Ok(SUCCESS)
        }
        Err(e) => {
            eprintln!("error: {e:#}");
            Ok(CONFIG_ERROR)
        }
    }
}
