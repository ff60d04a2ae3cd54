use crate::exit_codes::SUCCESS;
use warden_gateway::auth::hash_api_key;

pub fn cmd_hash(key: &str) -> i32 {
    println!("{}", hash_api_key(key));
    SUCCESS
}
