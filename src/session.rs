//! Wires a room, the console producer and the presentation sink together.

use std::sync::Arc;

use ds::PubSub;
use log::{debug, info, warn};
use tokio::io::{AsyncBufRead, AsyncWrite, AsyncWriteExt};

use crate::{
    config::ChatConfig,
    console::ConsoleProducer,
    help::get_help,
    presentation::{PresentationSink, SinkExit},
    room::ChatRoom,
    ChatError,
};

/// Run a chat session until the user quits or input ends.
///
/// An unusable config or failing to join the home room is fatal. The console producer is started
/// once and keeps serving across room switches; when its input ends the
/// session quits.
pub async fn run<P, R, C, W>(
    pubsub: Arc<P>,
    config: &ChatConfig,
    input: R,
    mut console_out: C,
    sink_out: W,
) -> Result<SinkExit, ChatError>
where
    P: PubSub,
    R: AsyncBufRead + Unpin + Send + 'static,
    C: AsyncWrite + Unpin + Send + 'static,
    W: AsyncWrite + Unpin,
{
    config.validate()?;
    let settings = config.room_settings(pubsub.local_peer_id());
    let home = settings.home.clone();
    let (room, feed) = ChatRoom::new(pubsub, settings);
    room.join(&home).await?;
    info!("{} ({}) in {home}", room.nick(), room.self_id());

    console_out.write_all(get_help("0").as_bytes()).await?;
    console_out.flush().await?;

    let console_room = room.clone();
    let console = tokio::spawn(async move {
        let res = ConsoleProducer::new(console_room.clone(), console_out)
            .run(input)
            .await;
        console_room.quit();
        res
    });

    let mut sink = PresentationSink::new(feed, room.quit_signal(), sink_out, config.color);
    let exit = sink.run().await;

    room.quit();
    room.shutdown().await;
    match console.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!("Console stopped with error: {e}"),
        Err(e) => debug!("Console task failed: {e}"),
    }
    info!("Session over: {exit:?}");
    Ok(exit?)
}
