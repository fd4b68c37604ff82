use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use fixtrack_core::{ActorId, Aggregate, AggregateRoot, DomainError, ItemId};

use crate::history::Transition;
use crate::place::Place;
use crate::size::ContainerSize;
use crate::status::{ItemStatus, StatusValue};

/// Fixed attributes decoded from the container's label at intake.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    /// Serial key printed on the container.
    pub serial: String,
    pub size: ContainerSize,
    pub lot_number: String,
    pub box_number: String,
    pub product_code: String,
    pub expires_on: Option<NaiveDate>,
}

impl Classification {
    fn validate(&self) -> Result<(), DomainError> {
        if self.serial.trim().is_empty() {
            return Err(DomainError::validation("serial key cannot be empty"));
        }
        if self.lot_number.trim().is_empty() {
            return Err(DomainError::validation("lot number cannot be empty"));
        }
        Ok(())
    }

    /// `lot - box - serial`, as printed on the detail ledger.
    pub fn combined_key(&self) -> String {
        format!("{} - {} - {}", self.lot_number, self.box_number, self.serial)
    }
}

/// Mutable part of an item: exactly what replaying its history produces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemState {
    pub status: ItemStatus,
    pub place: Place,
    /// Origin label, set only when the item left Dispensed from a surgical place.
    pub return_by: Option<String>,
    pub last_transition_at: DateTime<Utc>,
}

impl ItemState {
    /// State created by an item's first history row. `None` when that row
    /// carries no usable status.
    pub fn from_creation(t: &Transition) -> Option<Self> {
        let status = t.new_status.known()?;
        Some(Self {
            status,
            place: t.new_place.clone(),
            return_by: None,
            last_transition_at: t.occurred_at,
        })
    }

    /// Apply one later row.
    ///
    /// An unrecognized new status leaves the status untouched and an empty new
    /// place leaves the place untouched.
    pub fn apply(&mut self, t: &Transition) {
        if let Some(next) = t.new_status.known() {
            if next != self.status {
                self.return_by = (self.status == ItemStatus::Dispensed && self.place.is_surgical())
                    .then(|| self.place.label().into_owned());
                self.status = next;
            }
        }
        if !t.new_place.is_unset() {
            self.place = t.new_place.clone();
        }
        self.last_transition_at = t.occurred_at;
    }

    /// Fold a full, ordered history into a state.
    pub fn replay<'a>(history: impl IntoIterator<Item = &'a Transition>) -> Option<Self> {
        history.into_iter().fold(None, |state, t| match state {
            None => Self::from_creation(t),
            Some(mut s) => {
                s.apply(t);
                Some(s)
            }
        })
    }
}

/// Snapshot row of `containers`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub classification: Classification,
    pub state: ItemState,
}

impl Item {
    pub fn size(&self) -> ContainerSize {
        self.classification.size
    }

    pub fn status(&self) -> ItemStatus {
        self.state.status
    }

    pub fn is_expired(&self, today: NaiveDate) -> bool {
        self.classification.expires_on.is_some_and(|d| d < today)
    }
}

/// Aggregate root: one tracked container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Container {
    id: ItemId,
    item: Option<Item>,
    version: u64,
}

impl Container {
    /// Not-yet-received container, for rehydration.
    pub fn empty(id: ItemId) -> Self {
        Self {
            id,
            item: None,
            version: 0,
        }
    }

    pub fn from_snapshot(item: Item, version: u64) -> Self {
        Self {
            id: item.id,
            item: Some(item),
            version,
        }
    }

    pub fn item(&self) -> Option<&Item> {
        self.item.as_ref()
    }

    pub fn into_item(self) -> Option<Item> {
        self.item
    }
}

impl AggregateRoot for Container {
    type Id = ItemId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: Receive (intake scan).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receive {
    pub item_id: ItemId,
    pub classification: Classification,
    /// `Unset` receives into pathology stock.
    pub place: Place,
    pub actor: ActorId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: Dispense (hand out to a destination).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dispense {
    pub item_id: ItemId,
    pub destination: Place,
    pub actor: ActorId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: Submit (contents handed off).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submit {
    pub item_id: ItemId,
    pub actor: ActorId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ReturnToStock (unused container comes back).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnToStock {
    pub item_id: ItemId,
    pub actor: ActorId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: Relocate (place-only change).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relocate {
    pub item_id: ItemId,
    pub place: Place,
    pub actor: ActorId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: Correct (administrative edit of status and/or place).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Correct {
    pub item_id: ItemId,
    pub status: ItemStatus,
    /// `Unset` keeps the current place.
    pub place: Place,
    pub actor: ActorId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContainerCommand {
    Receive(Receive),
    Dispense(Dispense),
    Submit(Submit),
    ReturnToStock(ReturnToStock),
    Relocate(Relocate),
    Correct(Correct),
}

impl ContainerCommand {
    pub fn item_id(&self) -> ItemId {
        match self {
            ContainerCommand::Receive(c) => c.item_id,
            ContainerCommand::Dispense(c) => c.item_id,
            ContainerCommand::Submit(c) => c.item_id,
            ContainerCommand::ReturnToStock(c) => c.item_id,
            ContainerCommand::Relocate(c) => c.item_id,
            ContainerCommand::Correct(c) => c.item_id,
        }
    }
}

/// Event: Received.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Received {
    pub item_id: ItemId,
    pub classification: Classification,
    pub transition: Transition,
}

/// Event: Transitioned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transitioned {
    pub item_id: ItemId,
    pub transition: Transition,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContainerEvent {
    Received(Received),
    Transitioned(Transitioned),
}

impl ContainerEvent {
    pub fn item_id(&self) -> ItemId {
        match self {
            ContainerEvent::Received(e) => e.item_id,
            ContainerEvent::Transitioned(e) => e.item_id,
        }
    }

    pub fn transition(&self) -> &Transition {
        match self {
            ContainerEvent::Received(e) => &e.transition,
            ContainerEvent::Transitioned(e) => &e.transition,
        }
    }

    pub fn into_transition(self) -> Transition {
        match self {
            ContainerEvent::Received(e) => e.transition,
            ContainerEvent::Transitioned(e) => e.transition,
        }
    }
}

impl Aggregate for Container {
    type Command = ContainerCommand;
    type Event = ContainerEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            ContainerEvent::Received(e) => {
                self.id = e.item_id;
                self.item = ItemState::from_creation(&e.transition).map(|state| Item {
                    id: e.item_id,
                    classification: e.classification.clone(),
                    state,
                });
            }
            ContainerEvent::Transitioned(e) => {
                if let Some(item) = self.item.as_mut() {
                    item.state.apply(&e.transition);
                }
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        if command.item_id() != self.id {
            return Err(DomainError::WrongItem {
                target: self.id,
                command: command.item_id(),
            });
        }
        match command {
            ContainerCommand::Receive(cmd) => self.handle_receive(cmd),
            ContainerCommand::Dispense(cmd) => self.handle_dispense(cmd),
            ContainerCommand::Submit(cmd) => self.handle_submit(cmd),
            ContainerCommand::ReturnToStock(cmd) => self.handle_return(cmd),
            ContainerCommand::Relocate(cmd) => self.handle_relocate(cmd),
            ContainerCommand::Correct(cmd) => self.handle_correct(cmd),
        }
    }
}

impl Container {
    fn current(&self, occurred_at: DateTime<Utc>) -> Result<&ItemState, DomainError> {
        let item = self.item.as_ref().ok_or(DomainError::UnknownItem(self.id))?;
        // History is ordered by business time; a row stamped earlier than the
        // snapshot would replay into a different state.
        if occurred_at < item.state.last_transition_at {
            return Err(DomainError::validation(format!(
                "transition at {occurred_at} predates the last transition at {}",
                item.state.last_transition_at
            )));
        }
        Ok(&item.state)
    }

    fn transitioned(
        &self,
        state: &ItemState,
        actor: &ActorId,
        occurred_at: DateTime<Utc>,
        new_status: ItemStatus,
        new_place: Place,
    ) -> Vec<ContainerEvent> {
        vec![ContainerEvent::Transitioned(Transitioned {
            item_id: self.id,
            transition: Transition {
                actor: actor.clone(),
                occurred_at,
                old_status: StatusValue::Known(state.status),
                new_status: StatusValue::Known(new_status),
                old_place: state.place.clone(),
                new_place,
            },
        })]
    }

    fn handle_receive(&self, cmd: &Receive) -> Result<Vec<ContainerEvent>, DomainError> {
        if self.item.is_some() {
            return Err(DomainError::AlreadyReceived(self.id));
        }
        cmd.classification.validate()?;
        let place = match &cmd.place {
            Place::Unset => Place::PathologyStock,
            other => other.clone(),
        };
        Ok(vec![ContainerEvent::Received(Received {
            item_id: cmd.item_id,
            classification: cmd.classification.clone(),
            transition: Transition {
                actor: cmd.actor.clone(),
                occurred_at: cmd.occurred_at,
                old_status: StatusValue::Absent,
                new_status: StatusValue::Known(ItemStatus::Intake),
                old_place: Place::Unset,
                new_place: place,
            },
        })])
    }

    fn handle_dispense(&self, cmd: &Dispense) -> Result<Vec<ContainerEvent>, DomainError> {
        let state = self.current(cmd.occurred_at)?;
        if state.status != ItemStatus::Intake {
            return Err(DomainError::illegal(format!(
                "cannot dispense an item that is {}",
                state.status
            )));
        }
        match &cmd.destination {
            Place::Unset | Place::PathologyStock => {
                return Err(DomainError::validation("dispense destination must be outside stock"));
            }
            Place::Unlisted(raw) => {
                return Err(DomainError::validation(format!("unknown destination: {raw:?}")));
            }
            _ => {}
        }
        Ok(self.transitioned(
            state,
            &cmd.actor,
            cmd.occurred_at,
            ItemStatus::Dispensed,
            cmd.destination.clone(),
        ))
    }

    fn handle_submit(&self, cmd: &Submit) -> Result<Vec<ContainerEvent>, DomainError> {
        let state = self.current(cmd.occurred_at)?;
        if state.status == ItemStatus::Submitted {
            return Err(DomainError::illegal("item is already submitted"));
        }
        Ok(self.transitioned(
            state,
            &cmd.actor,
            cmd.occurred_at,
            ItemStatus::Submitted,
            state.place.clone(),
        ))
    }

    fn handle_return(&self, cmd: &ReturnToStock) -> Result<Vec<ContainerEvent>, DomainError> {
        let state = self.current(cmd.occurred_at)?;
        if state.status != ItemStatus::Dispensed {
            return Err(DomainError::illegal(format!(
                "only dispensed items can be returned (item is {})",
                state.status
            )));
        }
        Ok(self.transitioned(
            state,
            &cmd.actor,
            cmd.occurred_at,
            ItemStatus::Intake,
            Place::PathologyStock,
        ))
    }

    fn handle_relocate(&self, cmd: &Relocate) -> Result<Vec<ContainerEvent>, DomainError> {
        let state = self.current(cmd.occurred_at)?;
        if cmd.place.is_unset() {
            return Err(DomainError::validation("place cannot be empty"));
        }
        if cmd.place == state.place {
            return Err(DomainError::validation("item is already at that place"));
        }
        Ok(self.transitioned(state, &cmd.actor, cmd.occurred_at, state.status, cmd.place.clone()))
    }

    fn handle_correct(&self, cmd: &Correct) -> Result<Vec<ContainerEvent>, DomainError> {
        let state = self.current(cmd.occurred_at)?;
        let place = match &cmd.place {
            Place::Unset => state.place.clone(),
            other => other.clone(),
        };
        if cmd.status == state.status && place == state.place {
            return Err(DomainError::validation("correction changes nothing"));
        }
        Ok(self.transitioned(state, &cmd.actor, cmd.occurred_at, cmd.status, place))
    }
}
