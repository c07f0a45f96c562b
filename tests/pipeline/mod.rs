mod batch_run;
mod reconcile;
mod resume;
