//! Job Table — tracks every job the shell has launched until it completes
//! (spec.md §4.8). Grounded in `original_source/main.c`'s `first_job` linked
//! list (`job_is_completed`/`job_is_stopped`/notification sweep) and the
//! teacher's `jobs::JobTable`, re-expressed over the [`crate::ast::Job`]
//! (multi-process) type instead of the teacher's one-`Child`-per-job model.

use crate::ast::Job;

/// All jobs the shell is currently tracking, oldest first.
#[derive(Debug, Default)]
pub struct JobTable {
    jobs: Vec<Job>,
    next_id: usize,
}

impl JobTable {
    pub fn new() -> Self {
        JobTable {
            jobs: Vec::new(),
            next_id: 1,
        }
    }

    /// The id the next job built by the Plan Builder should use.
    pub fn next_id(&self) -> usize {
        self.next_id
    }

    /// Register a freshly-launched job, advancing the id counter past it.
    pub fn insert(&mut self, job: Job) {
        self.next_id = self.next_id.max(job.id + 1);
        self.jobs.push(job);
    }

    pub fn get(&self, id: usize) -> Option<&Job> {
        self.jobs.iter().find(|j| j.id == id)
    }

    pub fn get_mut(&mut self, id: usize) -> Option<&mut Job> {
        self.jobs.iter_mut().find(|j| j.id == id)
    }

    pub fn find_by_pgid_mut(&mut self, pgid: libc::pid_t) -> Option<&mut Job> {
        self.jobs.iter_mut().find(|j| j.pgid == Some(pgid))
    }

    /// Find the job owning the process with the given pid, for
    /// `mark_process_status`.
    pub fn find_by_pid_mut(&mut self, pid: libc::pid_t) -> Option<&mut Job> {
        self.jobs
            .iter_mut()
            .find(|j| j.processes.iter().any(|p| p.pid == Some(pid)))
    }

    pub fn remove(&mut self, id: usize) -> Option<Job> {
        let idx = self.jobs.iter().position(|j| j.id == id)?;
        Some(self.jobs.remove(idx))
    }

    /// Remove every job whose processes have all completed.
    pub fn remove_completed(&mut self) -> Vec<Job> {
        let (done, remaining): (Vec<_>, Vec<_>) =
            self.jobs.drain(..).partition(|j| j.is_completed());
        self.jobs = remaining;
        done
    }

    /// All jobs sorted by job id (ascending), for the `jobs` builtin.
    pub fn jobs_sorted(&self) -> Vec<&Job> {
        let mut list: Vec<&Job> = self.jobs.iter().collect();
        list.sort_by_key(|j| j.id);
        list
    }

    /// Default target for `fg`/`bg` with no argument: the highest job id.
    pub fn most_recent_id(&self) -> Option<usize> {
        self.jobs.iter().map(|j| j.id).max()
    }

    /// Default target for `bg` with no argument: the highest id among
    /// currently stopped jobs.
    pub fn most_recent_stopped_id(&self) -> Option<usize> {
        self.jobs
            .iter()
            .filter(|j| j.is_stopped())
            .map(|j| j.id)
            .max()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Job> {
        self.jobs.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Job> {
        self.jobs.iter_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Process;

    fn sample_job(id: usize) -> Job {
        Job::new(id, format!("cmd-{id}"), vec![Process::new(vec!["true".into()])])
    }

    #[test]
    fn insert_advances_next_id() {
        let mut table = JobTable::new();
        table.insert(sample_job(1));
        assert_eq!(table.next_id(), 2);
    }

    #[test]
    fn most_recent_id_is_the_max() {
        let mut table = JobTable::new();
        table.insert(sample_job(1));
        table.insert(sample_job(3));
        assert_eq!(table.most_recent_id(), Some(3));
    }

    #[test]
    fn remove_completed_drops_finished_jobs_only() {
        let mut table = JobTable::new();
        let mut done = sample_job(1);
        done.processes[0].completed = true;
        done.processes[0].exit_status = Some(0);
        table.insert(done);
        table.insert(sample_job(2));

        let removed = table.remove_completed();
        assert_eq!(removed.len(), 1);
        assert_eq!(removed[0].id, 1);
        assert_eq!(table.jobs_sorted().len(), 1);
        assert_eq!(table.jobs_sorted()[0].id, 2);
    }

    #[test]
    fn most_recent_stopped_id_ignores_running_jobs() {
        let mut table = JobTable::new();
        table.insert(sample_job(1));
        let mut stopped = sample_job(2);
        stopped.processes[0].stopped = true;
        table.insert(stopped);
        assert_eq!(table.most_recent_stopped_id(), Some(2));
    }
}
