pub mod player_state;
pub mod scene;
pub mod story;
