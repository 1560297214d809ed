pub mod hello_world;
