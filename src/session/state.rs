use atomic_enum::atomic_enum;

/// Where the supervisor currently is in a session.
#[atomic_enum]
#[derive(PartialEq, Eq)]
pub enum SessionState {
    Idle = 0,
    FetchingMetadata,
    CreatingDestination,
    SettingUpTransport,
    Bootstrapping,
    AwaitingPeers,
    Downloading,
    Finalizing,
    MetadataReported,
    Succeeded,
    StatReported,
    Failed,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::MetadataReported | Self::Succeeded | Self::StatReported | Self::Failed
        )
    }
}

/// Told about every state a session enters.
pub trait StepObserver: Send + Sync {
    fn enter_state(&self, state: SessionState);
}

impl<F> StepObserver for F
where
    F: Fn(SessionState) + Send + Sync,
{
    fn enter_state(&self, state: SessionState) {
        self(state)
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::FetchingMetadata => "fetching_metadata",
            Self::CreatingDestination => "creating_destination",
            Self::SettingUpTransport => "setting_up_transport",
            Self::Bootstrapping => "bootstrapping",
            Self::AwaitingPeers => "awaiting_peers",
            Self::Downloading => "downloading",
            Self::Finalizing => "finalizing",
            Self::MetadataReported => "metadata_reported",
            Self::Succeeded => "succeeded",
            Self::StatReported => "stat_reported",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}
