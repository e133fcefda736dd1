//! services/api/src/bin/openapi.rs
//!
//! Prints the OpenAPI specification as JSON to stdout, for exporting to
//! client generators without starting the server.

use api_lib::web::rest::ApiDoc;
use utoipa::OpenApi;

fn main() {
    let doc = ApiDoc::openapi();
    match doc.to_pretty_json() {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("Failed to serialize OpenAPI document: {}", e);
            std::process::exit(1);
        }
    }
}
