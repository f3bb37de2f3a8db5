//! Title announcement listener
//!
//! The running title broadcasts its name; the latest one is carried in
//! every core frame.

use defmt::*;
use embassy_net::Stack;

use smbwatch_protocol::TitleAnnouncement;

use crate::channels::APP_NAME;
use crate::net::SocketBuffers;

#[embassy_executor::task]
pub async fn title_rx_task(stack: Stack<'static>, port: u16) {
    let Some(mut app_name) = APP_NAME.writer() else {
        error!("App name already has a writer");
        return;
    };
    let mut buffers = SocketBuffers::<512, 32>::new();
    let Some(socket) = buffers.bind(stack, port) else {
        error!("Title socket bind to port {} failed", port);
        return;
    };
    info!("Listening for title announcements on port {}", port);

    let mut buf = [0u8; 256];
    loop {
        let len = match socket.recv_from(&mut buf).await {
            Ok((len, _from)) => len,
            Err(e) => {
                warn!("Title receive failed: {:?}", e);
                continue;
            }
        };
        // also drops the eeprom lines sharing the port
        let Some(title) = TitleAnnouncement::parse(&buf[..len]) else {
            continue;
        };
        if title.name != APP_NAME.get() {
            info!("Running title: {} ({})", title.name.as_str(), title.title_id);
            app_name.publish(title.name);
        }
    }
}
