use crate::bot_communication::bot_messenger::{BotApiSink, BotMessenger, LogOnlySink, NotifySink};
use crate::config::{Config, FlapBackend};
use crate::fatal;
use crate::flap_control::episode::{DecisionEngine, EpisodeState};
use crate::flap_control::flap_controller::{
    DetectionPauser, FlapCommander, FlapController, LocalFlapCommander, LockStatePauser,
    NeverPause, ReedLogGate, RemoteFlap,
};
use crate::flap_control::prey_classifier::ApiPreyClassifier;
use crate::flap_control::prey_dispatcher::PreyDispatcher;
use crate::http_handler::http_client::HTTPClient;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use tokio::runtime::Handle;

/// Suppression window after a reed-logged flap event.
const RECENT_EXIT_WINDOW: Duration = Duration::from_secs(180);

/// Struct representing the key components of the application, providing
/// access to the various subsystems: the flap actuator, the prey-detection
/// dispatcher, the episode state and the notification messenger. This is
/// the single dependency-injection root; nothing else holds process-wide
/// state.
pub struct Keychain {
    /// The full runtime configuration.
    config: Arc<Config>,
    /// The notification messenger feeding the bot transport.
    messenger: Arc<BotMessenger>,
    /// The flap actuator back-end selected by configuration.
    commander: Arc<dyn FlapCommander>,
    /// The prey-detection dispatcher with its consumer and decision engine.
    dispatcher: Arc<PreyDispatcher>,
    /// The episode state shared by admission path and decision engine.
    episode: Arc<StdMutex<EpisodeState>>,
    /// The local flap controller; present only in local-timer mode.
    flap_controller: Option<Arc<FlapController>>,
}

impl Keychain {
    /// Creates a new instance of `Keychain`, wiring every subsystem.
    /// Must run inside the tokio runtime; the capture thread later drives
    /// async work through the handle captured here.
    pub fn new(config: Config) -> Self {
        let config = Arc::new(config);
        let handle = Handle::current();

        let sink: Arc<dyn NotifySink> = if config.notify.enabled {
            let token = config
                .notify
                .token
                .as_deref()
                .unwrap_or_else(|| fatal!("Notifications enabled but BOT_TOKEN is missing"));
            let chat_id = config
                .notify
                .chat_id
                .unwrap_or_else(|| fatal!("Notifications enabled but GROUP_ID is missing"));
            Arc::new(BotApiSink::new(&config.notify.bot_base_url, token, chat_id))
        } else {
            Arc::new(LogOnlySink)
        };
        let messenger = Arc::new(BotMessenger::start(sink));

        let flap_client = Arc::new(HTTPClient::new(&config.flap.base_url));
        let (commander, pauser, flap_controller): (
            Arc<dyn FlapCommander>,
            Arc<dyn DetectionPauser>,
            Option<Arc<FlapController>>,
        ) = match config.flap.backend {
            FlapBackend::Local => {
                let controller =
                    FlapController::new(Duration::from_secs_f64(config.flap.lock_time_s));
                (
                    Arc::new(LocalFlapCommander::new(Arc::clone(&controller))),
                    Arc::new(LockStatePauser::new(Arc::clone(&controller))),
                    Some(controller),
                )
            }
            FlapBackend::Remote => (
                Arc::new(RemoteFlap::new(Arc::clone(&flap_client))),
                Arc::new(NeverPause),
                None,
            ),
        };

        let api_key = if config.pipeline.prey_detection_enabled {
            config
                .prey_api
                .api_key
                .clone()
                .unwrap_or_else(|| fatal!("Prey detection enabled but PREY_API_KEY is missing"))
        } else {
            String::new()
        };
        let classifier = Arc::new(ApiPreyClassifier::new(
            &config.prey_api.api_url,
            api_key,
            Arc::clone(&commander),
            config.runtime.prey_images_dir.clone(),
        ));

        let episode = Arc::new(StdMutex::new(EpisodeState::default()));
        let engine = Arc::new(DecisionEngine::new(
            Arc::clone(&episode),
            Arc::clone(&commander),
            Arc::clone(&messenger),
        ));
        let gate = Arc::new(ReedLogGate::new(
            Arc::clone(&flap_client),
            handle.clone(),
            RECENT_EXIT_WINDOW,
        ));

        let dispatcher = PreyDispatcher::new(
            config.dispatcher.clone(),
            config.pipeline.prey_detection_enabled,
            config.pipeline.save_images,
            Arc::clone(&episode),
            classifier,
            engine,
            gate,
            pauser,
            Arc::clone(&messenger),
            handle,
            config.runtime.prey_detector_images_dir.clone(),
        );

        Self { config, messenger, commander, dispatcher, episode, flap_controller }
    }

    /// Provides a cloned reference to the configuration.
    pub fn config(&self) -> Arc<Config> { Arc::clone(&self.config) }

    /// Provides a cloned reference to the notification messenger.
    pub fn messenger(&self) -> Arc<BotMessenger> { Arc::clone(&self.messenger) }

    /// Provides a cloned reference to the flap actuator.
    pub fn commander(&self) -> Arc<dyn FlapCommander> { Arc::clone(&self.commander) }

    /// Provides a cloned reference to the prey-detection dispatcher.
    pub fn dispatcher(&self) -> Arc<PreyDispatcher> { Arc::clone(&self.dispatcher) }

    /// Provides a cloned reference to the episode state.
    pub fn episode(&self) -> Arc<StdMutex<EpisodeState>> { Arc::clone(&self.episode) }

    /// Provides the local flap controller when running the local-timer
    /// back-end.
    pub fn flap_controller(&self) -> Option<Arc<FlapController>> {
        self.flap_controller.as_ref().map(Arc::clone)
    }
}
