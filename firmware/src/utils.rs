use embassy_net::Stack;
use embassy_time::{Duration, TimeoutError, WithTimeout};

use crate::config::STACK_TIMEOUT_SECS;

/// Moves a value into a `StaticCell` and hands back the `&'static mut`.
macro_rules! mk_static {
    ($t:ty,$val:expr) => {{
        static STATIC_CELL: static_cell::StaticCell<$t> = static_cell::StaticCell::new();
        #[deny(unused_attributes)]
        let x = STATIC_CELL.uninit().write(($val));
        x
    }};
}

pub async fn wait_for_stack(stack: &Stack<'static>) -> Result<(), TimeoutError> {
    stack
        .wait_link_up()
        .with_timeout(Duration::from_secs(STACK_TIMEOUT_SECS))
        .await?;

    stack
        .wait_config_up()
        .with_timeout(Duration::from_secs(STACK_TIMEOUT_SECS))
        .await?;

    Ok(())
}
