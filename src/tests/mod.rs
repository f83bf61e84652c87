pub mod test_agent;
