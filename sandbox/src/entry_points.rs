//! Contract entry points and their guest signatures.

/// An exported contract function the host can invoke.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryPoint {
    Instantiate,
    Execute,
    Migrate,
    Query,
    IbcChannelOpen,
    IbcChannelConnect,
    IbcChannelClose,
    IbcPacketReceive,
    IbcPacketAck,
    IbcPacketTimeout,
}

impl EntryPoint {
    pub const ALL: [EntryPoint; 10] = [
        Self::Instantiate,
        Self::Execute,
        Self::Migrate,
        Self::Query,
        Self::IbcChannelOpen,
        Self::IbcChannelConnect,
        Self::IbcChannelClose,
        Self::IbcPacketReceive,
        Self::IbcPacketAck,
        Self::IbcPacketTimeout,
    ];

    /// Export name in the module.
    pub fn name(self) -> &'static str {
        match self {
            Self::Instantiate => "instantiate",
            Self::Execute => "execute",
            Self::Migrate => "migrate",
            Self::Query => "query",
            Self::IbcChannelOpen => "ibc_channel_open",
            Self::IbcChannelConnect => "ibc_channel_connect",
            Self::IbcChannelClose => "ibc_channel_close",
            Self::IbcPacketReceive => "ibc_packet_receive",
            Self::IbcPacketAck => "ibc_packet_ack",
            Self::IbcPacketTimeout => "ibc_packet_timeout",
        }
    }

    /// Instantiate and execute also receive the message info payload.
    pub fn takes_info(self) -> bool {
        matches!(self, Self::Instantiate | Self::Execute)
    }

    pub fn is_ibc(self) -> bool {
        self.name().starts_with("ibc_")
    }

    /// Number of i32 parameters of the export:
    /// `(env, [info,] msg)` as pointer/length pairs plus the two out slots.
    pub fn param_count(self) -> usize {
        if self.takes_info() {
            8
        } else {
            6
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|e| e.name() == name)
    }
}
