pub mod animation;
pub mod config;
pub mod error;
pub mod frame;
pub mod gesture;
pub mod layout;
pub mod matrix;
pub mod pane;
pub mod remote;
pub mod tween;
pub mod tasks {
    pub mod gestures;
    pub mod renderer;
    pub mod sleeper;
}
