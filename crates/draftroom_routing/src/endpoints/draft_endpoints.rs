use axum::extract::connect_info::ConnectInfo;
use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Json, Path, State, WebSocketUpgrade};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::Router;
use futures::{SinkExt, StreamExt};

use draftroom_infrastructure::services::ServiceRegistry;
use draftroom_interface::draft::model::{DraftRoom, PickRequest, RoomSpec};
use draftroom_interface::draft::protocol::{ClientCommand, ServerEvent};
use draftroom_interface::draft::service::DraftServiceHandle;
use draftroom_interface::errors::{AppError, Result};

use std::net::SocketAddr;
use tokio::sync::{broadcast, mpsc};

/// Identity captured when the socket joins a room; every later command on
/// this connection is attributed to it.
#[derive(Clone)]
struct JoinContext {
    draft_id: String,
    user_id: String,
    team_id: String,
}

pub struct DraftRouter;

impl DraftRouter {
    pub fn new(service_registry: ServiceRegistry) -> Router {
        Router::new()
            .route("/ws", get(Self::ws_handler))
            .route("/rooms", get(Self::list_rooms).post(Self::create_room))
            .route(
                "/rooms/:id",
                get(Self::get_room).delete(Self::delete_room),
            )
            .route("/rooms/:id/start", post(Self::start_draft))
            .with_state(service_registry)
    }

    async fn list_rooms(
        State(draft_service): State<DraftServiceHandle>,
    ) -> Result<Json<Vec<String>>> {
        draft_service.list_rooms().await.map(Json)
    }

    async fn create_room(
        State(draft_service): State<DraftServiceHandle>,
        Json(spec): Json<RoomSpec>,
    ) -> Result<Json<DraftRoom>> {
        draft_service.create_room(spec).await.map(Json)
    }

    async fn get_room(
        Path(id): Path<String>,
        State(draft_service): State<DraftServiceHandle>,
    ) -> Result<Json<DraftRoom>> {
        draft_service.room_snapshot(&id).await.map(Json)
    }

    async fn start_draft(
        Path(id): Path<String>,
        State(draft_service): State<DraftServiceHandle>,
    ) -> Result<Json<DraftRoom>> {
        draft_service.start_draft(&id).await.map(Json)
    }

    async fn delete_room(
        Path(id): Path<String>,
        State(draft_service): State<DraftServiceHandle>,
    ) -> Result<Json<bool>> {
        draft_service.delete_room(&id).await.map(Json)
    }

    async fn ws_handler(
        ws: WebSocketUpgrade,
        ConnectInfo(addr): ConnectInfo<SocketAddr>,
        State(draft_service): State<DraftServiceHandle>,
    ) -> impl IntoResponse {
        ws.on_upgrade(move |socket| Self::handle_socket(socket, addr, draft_service))
    }

    // The initial socket state. The client must send `join-draft` before
    // anything else; the returned receiver carries the room's broadcasts
    // and the full room state is pushed so reconnecting clients can
    // resynchronize without replaying history.
    async fn waiting_join_draft_command(
        socket: &mut WebSocket,
        addr: &SocketAddr,
        draft_service: &DraftServiceHandle,
    ) -> Result<(broadcast::Receiver<String>, JoinContext)> {
        while let Some(Ok(msg)) = socket.recv().await {
            if let Message::Text(frame) = msg {
                match ClientCommand::parse(&frame) {
                    Ok(ClientCommand::JoinDraft {
                        draft_id,
                        user_id,
                        team_id,
                    }) => {
                        let (rx, snapshot) = match draft_service
                            .join_room(&draft_id, &user_id, &team_id, *addr)
                            .await
                        {
                            Ok(joined) => joined,
                            Err(err) => {
                                // The client learns why the join failed
                                // before the socket is dropped.
                                let frame = ServerEvent::error(&err).to_json();
                                let _ = socket.send(Message::Text(frame)).await;
                                return Err(err);
                            }
                        };

                        let state = ServerEvent::DraftState(snapshot).to_json();
                        let _ = socket.send(Message::Text(state)).await;

                        return Ok((
                            rx,
                            JoinContext {
                                draft_id,
                                user_id,
                                team_id,
                            },
                        ));
                    }
                    Ok(_) => continue,
                    Err(err) => {
                        let frame = ServerEvent::error(&err).to_json();
                        let _ = socket.send(Message::Text(frame)).await;
                    }
                }
            }
        }
        Err(AppError::ParseError {
            msg: "the socket closed before joining a draft room".to_string(),
        })
    }

    async fn handle_socket(mut socket: WebSocket, addr: SocketAddr, draft_service: DraftServiceHandle) {
        let Ok((mut rx, context)) =
            Self::waiting_join_draft_command(&mut socket, &addr, &draft_service).await
        else {
            // Never joined a room; nothing to tear down.
            return;
        };

        let (mut sender, mut receiver) = socket.split();

        // An mpsc shares the socket sender between the command task (error
        // replies) and the room broadcast forwarder.
        let (agg_sender, mut agg_receiver) = mpsc::channel::<String>(100);

        tokio::spawn(async move {
            while let Some(message) = agg_receiver.recv().await {
                if sender.send(message.into()).await.is_err() {
                    break;
                }
            }
        });

        // Handle commands received from the socket client. Validation
        // failures go back only to this connection, never to the room.
        let mut command_task = {
            let reply_sender = agg_sender.clone();
            let context = context.clone();
            let draft_service = draft_service.clone();
            tokio::spawn(async move {
                while let Some(Ok(msg)) = receiver.next().await {
                    if let Message::Text(frame) = msg {
                        let result = match ClientCommand::parse(&frame) {
                            Ok(command) => {
                                Self::dispatch_command(
                                    &draft_service,
                                    &context,
                                    command,
                                    &reply_sender,
                                )
                                .await
                            }
                            Err(err) => Err(err),
                        };
                        if let Err(err) = result {
                            let frame = ServerEvent::error(&err).to_json();
                            if reply_sender.send(frame).await.is_err() {
                                break;
                            }
                        }
                    }
                }
            })
        };

        // Forward room broadcasts to the socket client.
        let mut forward_task = {
            let forward_sender = agg_sender.clone();
            tokio::spawn(async move {
                while let Ok(msg) = rx.recv().await {
                    if forward_sender.send(msg).await.is_err() {
                        break;
                    }
                }
            })
        };

        // If either side completes, tear the other one down.
        tokio::select! {
            _ = (&mut command_task) => forward_task.abort(),
            _ = (&mut forward_task) => command_task.abort(),
        };

        // Losing the socket always deregisters the connection; the
        // orchestrator applies the room's disconnect policy.
        if let Err(err) = draft_service
            .leave_room(&context.draft_id, &context.user_id, &context.team_id, addr)
            .await
        {
            tracing::warn!(error = %err, draft_id = %context.draft_id, "socket teardown failed");
        }
    }

    async fn dispatch_command(
        draft_service: &DraftServiceHandle,
        context: &JoinContext,
        command: ClientCommand,
        reply_sender: &mpsc::Sender<String>,
    ) -> Result<()> {
        match command {
            ClientCommand::MakePick {
                player_id,
                player_name,
                position,
            } => {
                draft_service
                    .make_pick(
                        &context.draft_id,
                        &context.team_id,
                        PickRequest {
                            player_id,
                            player_name,
                            position,
                        },
                    )
                    .await?;
                Ok(())
            }
            ClientCommand::ToggleAutopick { enabled } => {
                draft_service
                    .toggle_autopick(&context.draft_id, &context.team_id, enabled)
                    .await
            }
            ClientCommand::DraftChat { message } => {
                draft_service
                    .send_chat(&context.draft_id, &context.team_id, &message)
                    .await
            }
            ClientCommand::PauseDraft {} => {
                draft_service
                    .pause_draft(&context.draft_id, "commissioner_pause")
                    .await
            }
            ClientCommand::ResumeDraft {} => draft_service.resume_draft(&context.draft_id).await,
            // The socket stays in the room it first joined; a repeated join
            // is treated as a resynchronization request and answered with
            // the current room state.
            ClientCommand::JoinDraft { .. } => {
                let snapshot = draft_service.room_snapshot(&context.draft_id).await?;
                let frame = ServerEvent::DraftState(snapshot).to_json();
                let _ = reply_sender.send(frame).await;
                Ok(())
            }
        }
    }
}
