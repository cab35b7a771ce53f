mod health_check;
mod users;

pub use health_check::health_check;
pub use users::{
    change_password, channel_profile, current_user, login, logout, refresh, register,
};
