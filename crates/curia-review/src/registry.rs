use crate::audit::{AuditRule, Tally};
use crate::detection::DetectionRule;
use crate::error::{Result, ReviewError};
use curia_types::{
    AccountId, Amount, BoxId, Currency, ItemId, ItemState, PlatformId, Strategy, TaskId,
    TaskState, Timestamp,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Inbound description of a task, as delivered by `on_task_opened`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSpec {
    pub requester: AccountId,
    pub platform: PlatformId,
    pub box_id: BoxId,
    pub strategy: Strategy,
    /// Lump sum for one-time strategies; rate per 10_000 usage units for `Divide`.
    pub reward_amount: Amount,
    pub currency: Currency,
    #[serde(default)]
    pub audit_rule: AuditRule,
    #[serde(default)]
    pub detection_rule: DetectionRule,
    pub deadline: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub requester: AccountId,
    pub platform: PlatformId,
    pub box_id: BoxId,
    pub strategy: Strategy,
    pub reward_amount: Amount,
    pub currency: Currency,
    pub audit_rule: AuditRule,
    pub detection_rule: DetectionRule,
    pub deadline: Timestamp,
    pub state: TaskState,
    pub adopted_item: Option<ItemId>,
    pub adopted_at: Option<Timestamp>,
    pub opened_at: Timestamp,
}

impl Task {
    pub fn is_open(&self) -> bool {
        self.state == TaskState::Open
    }
}

/// Inbound description of an item, as delivered by `on_item_submitted`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemSpec {
    pub task_id: TaskId,
    pub submitter: AccountId,
    /// 64-bit perceptual fingerprint of the submitted content.
    pub fingerprint: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub task_id: TaskId,
    pub submitter: AccountId,
    pub fingerprint: u64,
    pub state: ItemState,
    pub positive_votes: u32,
    pub negative_votes: u32,
    pub submitted_at: Timestamp,
    pub state_changed_at: Timestamp,
}

impl Item {
    pub fn tally(&self) -> Tally {
        Tally::new(self.positive_votes, self.negative_votes)
    }
}

/// Arena of tasks and items keyed by monotonically allocated ids.
#[derive(Debug, Clone, Default)]
pub struct ItemRegistry {
    tasks: BTreeMap<TaskId, Task>,
    items: BTreeMap<ItemId, Item>,
    items_by_task: BTreeMap<TaskId, Vec<ItemId>>,
    last_task: TaskId,
    last_item: ItemId,
}

impl ItemRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn task(&self, id: TaskId) -> Result<&Task> {
        self.tasks.get(&id).ok_or(ReviewError::TaskNotFound(id))
    }

    pub fn item(&self, id: ItemId) -> Result<&Item> {
        self.items.get(&id).ok_or(ReviewError::ItemNotFound(id))
    }

    pub(crate) fn task_mut(&mut self, id: TaskId) -> Result<&mut Task> {
        self.tasks.get_mut(&id).ok_or(ReviewError::TaskNotFound(id))
    }

    pub(crate) fn item_mut(&mut self, id: ItemId) -> Result<&mut Item> {
        self.items.get_mut(&id).ok_or(ReviewError::ItemNotFound(id))
    }

    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.tasks.values()
    }

    pub fn items(&self) -> impl Iterator<Item = &Item> {
        self.items.values()
    }

    pub fn items_of(&self, task: TaskId) -> impl Iterator<Item = &Item> {
        self.items_by_task
            .get(&task)
            .into_iter()
            .flatten()
            .filter_map(|id| self.items.get(id))
    }

    pub(crate) fn insert_task(&mut self, spec: TaskSpec, now: Timestamp) -> TaskId {
        let id = self.last_task.next();
        self.last_task = id;
        self.tasks.insert(
            id,
            Task {
                id,
                requester: spec.requester,
                platform: spec.platform,
                box_id: spec.box_id,
                strategy: spec.strategy,
                reward_amount: spec.reward_amount,
                currency: spec.currency,
                audit_rule: spec.audit_rule,
                detection_rule: spec.detection_rule,
                deadline: spec.deadline,
                state: TaskState::Open,
                adopted_item: None,
                adopted_at: None,
                opened_at: now,
            },
        );
        id
    }

    pub(crate) fn insert_item(&mut self, spec: ItemSpec, now: Timestamp) -> ItemId {
        let id = self.last_item.next();
        self.last_item = id;
        self.items.insert(
            id,
            Item {
                id,
                task_id: spec.task_id,
                submitter: spec.submitter,
                fingerprint: spec.fingerprint,
                state: ItemState::Pending,
                positive_votes: 0,
                negative_votes: 0,
                submitted_at: now,
                state_changed_at: now,
            },
        );
        self.items_by_task.entry(spec.task_id).or_default().push(id);
        id
    }

    pub(crate) fn transition(&mut self, id: ItemId, next: ItemState, now: Timestamp) -> Result<()> {
        let item = self.item_mut(id)?;
        if !item.state.can_transition_to(&next) {
            return Err(ReviewError::InvalidTransition {
                item: id,
                from: item.state,
                to: next,
            });
        }
        debug!(item = %id, from = %item.state, to = %next, "🔄 Item state changed");
        item.state = next;
        item.state_changed_at = now;
        Ok(())
    }

    /// Closes the task on `item` and rejects its other pending items.
    pub(crate) fn close_on_adoption(
        &mut self,
        task_id: TaskId,
        item: ItemId,
        now: Timestamp,
    ) -> Result<Vec<ItemId>> {
        let task = self.task_mut(task_id)?;
        task.state = TaskState::Closed;
        task.adopted_item = Some(item);
        task.adopted_at = Some(now);
        self.reject_pending(task_id, now)
    }

    pub(crate) fn reopen(&mut self, task_id: TaskId) -> Result<()> {
        let task = self.task_mut(task_id)?;
        task.state = TaskState::Open;
        task.adopted_item = None;
        task.adopted_at = None;
        Ok(())
    }

    pub(crate) fn close_without_adoption(&mut self, task_id: TaskId, now: Timestamp) -> Result<Vec<ItemId>> {
        self.task_mut(task_id)?.state = TaskState::Closed;
        self.reject_pending(task_id, now)
    }

    fn reject_pending(&mut self, task_id: TaskId, now: Timestamp) -> Result<Vec<ItemId>> {
        let pending: Vec<ItemId> = self
            .items_of(task_id)
            .filter(|i| i.state == ItemState::Pending)
            .map(|i| i.id)
            .collect();
        for id in &pending {
            self.transition(*id, ItemState::Rejected, now)?;
        }
        Ok(pending)
    }
}
