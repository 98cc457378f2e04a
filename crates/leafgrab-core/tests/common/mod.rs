pub mod leaf_server;
