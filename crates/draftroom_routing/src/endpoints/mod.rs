pub mod draft_endpoints;
